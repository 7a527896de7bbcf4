//! Errors raised while handling portal requests.
//!
//! Handlers recover every variant at their boundary (see [`crate::handlers`]); only the
//! web layer maps what is left to HTTP status codes.

use store::StoreError;

use crate::fields::RegistryError;
use crate::validation::FieldErrors;

/// Message shown for a missing or stale anti-forgery token.
pub const SECURITY_MESSAGE: &str = "Security check failed.";

#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("security check failed")]
    Security,
    #[error("{} field(s) failed validation", .0.len())]
    Validation(FieldErrors),
    #[error("{0}")]
    EntityMutation(String),
    #[error("payment gateway: {0}")]
    Gateway(String),
    #[error("import aborted after {applied} row(s): {}", .messages.join("; "))]
    ImportBatch { messages: Vec<String>, applied: usize },
    #[error("geocoding: {0}")]
    Geocode(String),
    #[error("mail: {0}")]
    Mail(String),
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("password: {0}")]
    Password(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("not permitted")]
    Forbidden,
}

impl PortalError {
    /// The single top-level message shown above a re-rendered form.
    pub fn user_message(&self) -> String {
        match self {
            PortalError::Security => SECURITY_MESSAGE.to_string(),
            PortalError::Validation(_) => "Please correct the errors below.".to_string(),
            PortalError::EntityMutation(message) | PortalError::Gateway(message) => {
                message.clone()
            }
            PortalError::ImportBatch { messages, .. } => messages.join(" "),
            PortalError::InvalidCredentials => "Invalid username or password.".to_string(),
            PortalError::Forbidden => "You are not allowed to do that.".to_string(),
            _ => "There was an error in the submission. Please try again.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PortalError>;
