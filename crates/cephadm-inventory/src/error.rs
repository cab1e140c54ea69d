//! Error types for cephadm-inventory

use thiserror::Error;

/// Errors that can occur while validating or caching inventory data
#[derive(Error, Debug, Clone)]
pub enum InventoryError {
    /// Hostname failed the RFC-952-subset grammar, or `check-host` against
    /// the candidate host did not agree with the requested name.
    #[error("host validation failed: {0}")]
    HostValidation(String),

    /// Underlying cache blob could not be read or written
    #[error("cache error: {0}")]
    CacheError(String),

    /// A daemon refresh returned data that could not be parsed
    #[error("failed to parse daemon list: {0}")]
    ParseError(String),
}
