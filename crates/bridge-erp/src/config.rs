//! ERP Configuration

use std::time::Duration;

use crate::error::{ErpError, Result};

/// ERPNext connection settings
#[derive(Clone, Debug)]
pub struct ErpNextConfig {
    /// Site URL, e.g. `https://erp.example.com`
    pub base_url: String,

    pub api_key: String,

    pub api_secret: String,

    /// Per-request timeout
    pub timeout: Duration,

    /// Attempts per call, including the first
    pub max_attempts: u32,

    /// Base delay between attempts; grows linearly
    pub backoff: Duration,
}

impl ErpNextConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            timeout: Duration::from_secs(15),
            max_attempts: 3,
            backoff: Duration::from_millis(250),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new(
            require("ERPNEXT_URL")?,
            require("ERPNEXT_API_KEY")?,
            require("ERPNEXT_API_SECRET")?,
        );
        if let Some(secs) = parse_env::<u64>("ERPNEXT_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = parse_env::<u32>("ERPNEXT_MAX_ATTEMPTS")? {
            config.max_attempts = attempts.max(1);
        }
        Ok(config)
    }
}

/// Fixed values stamped on replicated documents
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderDefaults {
    /// Selling company on the sales order
    pub company: String,

    pub customer_group: String,

    pub territory: String,

    /// Delivery date offset when the shopper gave none
    pub lead_time_days: u64,

    /// Create/search rounds in find-or-create
    pub customer_attempts: u32,
}

impl Default for OrderDefaults {
    fn default() -> Self {
        Self {
            company: String::new(),
            customer_group: "Commercial".into(),
            territory: "United States".into(),
            lead_time_days: 30,
            customer_attempts: 2,
        }
    }
}

impl OrderDefaults {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            company: require("ERPNEXT_COMPANY")?,
            customer_group: std::env::var("ERPNEXT_CUSTOMER_GROUP")
                .unwrap_or(defaults.customer_group),
            territory: std::env::var("ERPNEXT_TERRITORY").unwrap_or(defaults.territory),
            ..defaults
        })
    }
}

fn require(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ErpError::Config(format!("{name} not set")))
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ErpError::Config(format!("{name} is not a valid number"))),
        Err(_) => Ok(None),
    }
}
