//! Server Configuration

use std::sync::Arc;

use bridge_erp::{ErpClient, ErpError, ErpNextClient, MemoryErp, DEFAULT_CLAIM_LEASE_SECS};
use bridge_payments::PaymentError;
use chrono::TimeDelta;
use thiserror::Error;

/// Startup configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown ERP_BACKEND '{0}' (expected 'erpnext' or 'memory')")]
    UnknownBackend(String),

    #[error("{0} is not a valid number")]
    InvalidNumber(&'static str),

    #[error(transparent)]
    Payments(#[from] PaymentError),

    #[error(transparent)]
    Erp(#[from] ErpError),
}

/// Which ERP the replicator writes to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErpBackend {
    ErpNext,
    /// Local development only; nothing leaves the process
    Memory,
}

impl ErpBackend {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "erpnext" => Ok(Self::ErpNext),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }

    /// Build the client for this backend
    pub fn connect(self) -> Result<Arc<dyn ErpClient>, ConfigError> {
        Ok(match self {
            Self::ErpNext => Arc::new(ErpNextClient::from_env()?),
            Self::Memory => Arc::new(MemoryErp::new()),
        })
    }
}

/// HTTP surface settings
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,

    /// Storefront origin for the success and cancel pages
    pub public_base_url: String,

    pub erp_backend: ErpBackend,

    /// How long a replication claim blocks redeliveries of the same session
    pub claim_lease: TimeDelta,
}

impl ServerConfig {
    /// Create from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into()),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            erp_backend: ErpBackend::parse(&std::env::var("ERP_BACKEND").unwrap_or_default())?,
            claim_lease: claim_lease(std::env::var("REPLICATION_LEASE_SECS").ok().as_deref())?,
        })
    }
}

fn claim_lease(raw: Option<&str>) -> Result<TimeDelta, ConfigError> {
    let secs = match raw {
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or(ConfigError::InvalidNumber("REPLICATION_LEASE_SECS"))?,
        None => DEFAULT_CLAIM_LEASE_SECS,
    };
    TimeDelta::try_seconds(secs).ok_or(ConfigError::InvalidNumber("REPLICATION_LEASE_SECS"))
}
