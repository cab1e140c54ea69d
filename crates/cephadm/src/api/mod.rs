//! API route handlers

pub mod daemons;
pub mod error;
pub mod hosts;
pub mod services;
pub mod system;
pub mod upgrade;

#[allow(unused)]
pub use error::{ApiError, AppError};
