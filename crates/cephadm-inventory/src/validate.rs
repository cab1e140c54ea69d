//! Hostname validation against the RFC-952-subset grammar used by the
//! inventory (§3): up to 250 characters total, dot-separated parts of
//! 1-63 characters each, alphabet `[a-zA-Z0-9-]`.

use crate::error::InventoryError;

const MAX_HOSTNAME_LEN: usize = 250;
const MAX_LABEL_LEN: usize = 63;

/// Validate a hostname against the grammar
///
/// # Errors
/// Returns `InventoryError::HostValidation` describing the violated rule.
pub fn validate_hostname(hostname: &str) -> Result<(), InventoryError> {
    if hostname.is_empty() {
        return Err(InventoryError::HostValidation(
            "hostname must not be empty".to_string(),
        ));
    }
    if hostname.len() > MAX_HOSTNAME_LEN {
        return Err(InventoryError::HostValidation(format!(
            "hostname exceeds {MAX_HOSTNAME_LEN} characters: {hostname}"
        )));
    }

    for part in hostname.split('.') {
        if part.is_empty() {
            return Err(InventoryError::HostValidation(format!(
                "hostname has an empty label: {hostname}"
            )));
        }
        if part.len() > MAX_LABEL_LEN {
            return Err(InventoryError::HostValidation(format!(
                "hostname label {part:?} exceeds {MAX_LABEL_LEN} characters"
            )));
        }
        if !part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(InventoryError::HostValidation(format!(
                "hostname label {part:?} contains characters outside [a-zA-Z0-9-]"
            )));
        }
    }

    Ok(())
}

/// Derive the short hostname (first dot-separated label) used by the
/// unique daemon-name generator.
#[must_use]
pub fn short_hostname(hostname: &str) -> &str {
    hostname.split('.').next().unwrap_or(hostname)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_hostname() {
        assert!(validate_hostname("host1").is_ok());
    }

    #[test]
    fn accepts_fqdn() {
        assert!(validate_hostname("host1.example.com").is_ok());
    }

    #[test]
    fn rejects_empty() {
        assert!(validate_hostname("").is_err());
    }

    #[test]
    fn rejects_empty_label() {
        assert!(validate_hostname("host1..example").is_err());
    }

    #[test]
    fn rejects_invalid_characters() {
        assert!(validate_hostname("host_1").is_err());
        assert!(validate_hostname("host1!").is_err());
    }

    #[test]
    fn rejects_label_over_63_chars() {
        let long_label = "a".repeat(64);
        assert!(validate_hostname(&long_label).is_err());
    }

    #[test]
    fn rejects_over_250_chars_total() {
        let long = vec!["a".repeat(60); 5].join(".");
        assert!(long.len() > MAX_HOSTNAME_LEN);
        assert!(validate_hostname(&long).is_err());
    }

    #[test]
    fn short_hostname_takes_first_label() {
        assert_eq!(short_hostname("host1.example.com"), "host1");
        assert_eq!(short_hostname("host1"), "host1");
    }
}
