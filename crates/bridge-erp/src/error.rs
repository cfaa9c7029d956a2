//! Error Types for ERP Replication

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ErpError>;

/// ERP transport and API errors
#[derive(Error, Debug)]
pub enum ErpError {
    /// Non-success response; `body` is the upstream error text
    #[error("ERP returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("ERP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("ERP response could not be read: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ErpError {
    /// Transient failure worth another attempt on a read
    pub fn is_retryable(&self) -> bool {
        match self {
            ErpError::Transport(e) => e.is_connect() || e.is_timeout(),
            ErpError::Upstream { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            _ => false,
        }
    }

    /// Transient failure where the request cannot have been applied
    pub fn is_safe_to_resend(&self) -> bool {
        match self {
            ErpError::Transport(e) => e.is_connect(),
            ErpError::Upstream { status, .. } => matches!(status, 429 | 503),
            _ => false,
        }
    }
}

/// Why a paid session did not make it into the ERP
#[derive(Error, Debug)]
pub enum ReplicationError {
    /// Cart metadata missing or undecodable
    #[error("Invalid cart data: {0}")]
    Parse(String),

    #[error(transparent)]
    Erp(#[from] ErpError),

    #[error("Replication ledger error: {0}")]
    Ledger(String),
}
