//! Payment Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Bad client input (empty cart, zero quantity, negative price)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Payment provider call failed
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Webhook arrived without a signature header
    #[error("Missing webhook signature header")]
    MissingSignature,

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    Signature(String),

    /// Cart metadata or webhook payload could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PaymentError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, PaymentError::Gateway(_))
    }

    /// Whether the webhook caller failed authentication
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, PaymentError::MissingSignature | PaymentError::Signature(_))
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> &str {
        match self {
            PaymentError::Validation(msg) => msg,
            PaymentError::Gateway(_) => "Failed to create checkout session",
            PaymentError::MissingSignature => "Missing stripe-signature header",
            PaymentError::Signature(_) => "Webhook signature verification failed",
            PaymentError::Parse(_) => "Malformed webhook payload",
            PaymentError::Config(_) => "Service configuration error.",
            PaymentError::Json(_) => "An error occurred processing your request.",
        }
    }
}
