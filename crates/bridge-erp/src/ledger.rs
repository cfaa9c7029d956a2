//! Replication Ledger
//!
//! Tracks each checkout session through replication so a redelivered webhook
//! never produces a second customer or sales order.
//!
//! A `Replicating` claim is a lease. A handler dropped mid-flight (the provider
//! hung up, the process stopped) never finishes its entry, so a claim older
//! than the lease is handed to the next delivery.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ReplicationError;

/// Replication status of one checkout session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReplicationStatus {
    /// A handler is working on it; `customer` is set once resolved
    Replicating {
        customer: Option<String>,
        /// Last claim or progress; the lease runs from here
        claimed_at: DateTime<Utc>,
    },

    Replicated { customer: String, sales_order: String },

    /// Terminal until someone resends the event
    ReplicationFailed { customer: Option<String>, error: String },
}

/// Result of trying to take ownership of a session
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Claim {
    /// Caller owns replication; reuse `customer` if a previous try resolved one
    Acquired { customer: Option<String> },

    AlreadyReplicated { customer: String, sales_order: String },

    /// Another delivery holds an unexpired claim
    InFlight,
}

/// Ledger storage trait
pub trait ReplicationLedger: Send + Sync {
    /// Atomically move the session into `Replicating` unless it is done or
    /// held by an unexpired claim
    fn claim(&self, session_id: &str) -> Result<Claim, ReplicationError>;

    /// Record the ERP customer before the order is attempted
    fn record_customer(&self, session_id: &str, customer: &str) -> Result<(), ReplicationError>;

    fn complete(
        &self,
        session_id: &str,
        customer: &str,
        sales_order: &str,
    ) -> Result<(), ReplicationError>;

    fn fail(&self, session_id: &str, error: &str) -> Result<(), ReplicationError>;

    fn status(&self, session_id: &str) -> Result<Option<ReplicationStatus>, ReplicationError>;
}

/// Claim lifetime unless configured otherwise
pub const DEFAULT_CLAIM_LEASE_SECS: i64 = 300;

/// In-memory ledger (single process)
pub struct MemoryLedger {
    sessions: RwLock<HashMap<String, ReplicationStatus>>,
    lease: TimeDelta,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self {
            sessions: RwLock::default(),
            lease: TimeDelta::seconds(DEFAULT_CLAIM_LEASE_SECS),
        }
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override how long a `Replicating` claim blocks other deliveries
    pub fn with_lease(mut self, lease: TimeDelta) -> Self {
        self.lease = lease;
        self
    }

    fn update(
        &self,
        session_id: &str,
        f: impl FnOnce(Option<&ReplicationStatus>) -> ReplicationStatus,
    ) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let next = f(sessions.get(session_id));
        sessions.insert(session_id.to_string(), next);
    }
}

fn known_customer(status: Option<&ReplicationStatus>) -> Option<String> {
    match status {
        Some(
            ReplicationStatus::Replicating { customer, .. }
            | ReplicationStatus::ReplicationFailed { customer, .. },
        ) => customer.clone(),
        Some(ReplicationStatus::Replicated { customer, .. }) => Some(customer.clone()),
        None => None,
    }
}

impl ReplicationLedger for MemoryLedger {
    fn claim(&self, session_id: &str) -> Result<Claim, ReplicationError> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now();

        match sessions.get(session_id) {
            Some(ReplicationStatus::Replicated {
                customer,
                sales_order,
            }) => Ok(Claim::AlreadyReplicated {
                customer: customer.clone(),
                sales_order: sales_order.clone(),
            }),
            Some(ReplicationStatus::Replicating { claimed_at, .. })
                if now.signed_duration_since(*claimed_at) < self.lease =>
            {
                Ok(Claim::InFlight)
            }
            previous => {
                if let Some(ReplicationStatus::Replicating { claimed_at, .. }) = previous {
                    tracing::warn!(
                        session_id,
                        claimed_at = %claimed_at,
                        "Replication claim expired, taking over"
                    );
                }
                let customer = known_customer(previous);
                sessions.insert(
                    session_id.to_string(),
                    ReplicationStatus::Replicating {
                        customer: customer.clone(),
                        claimed_at: now,
                    },
                );
                Ok(Claim::Acquired { customer })
            }
        }
    }

    fn record_customer(&self, session_id: &str, customer: &str) -> Result<(), ReplicationError> {
        self.update(session_id, |_| ReplicationStatus::Replicating {
            customer: Some(customer.to_string()),
            claimed_at: Utc::now(),
        });
        Ok(())
    }

    fn complete(
        &self,
        session_id: &str,
        customer: &str,
        sales_order: &str,
    ) -> Result<(), ReplicationError> {
        self.update(session_id, |_| ReplicationStatus::Replicated {
            customer: customer.to_string(),
            sales_order: sales_order.to_string(),
        });
        Ok(())
    }

    fn fail(&self, session_id: &str, error: &str) -> Result<(), ReplicationError> {
        self.update(session_id, |previous| ReplicationStatus::ReplicationFailed {
            customer: known_customer(previous),
            error: error.to_string(),
        });
        Ok(())
    }

    fn status(&self, session_id: &str) -> Result<Option<ReplicationStatus>, ReplicationError> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        Ok(sessions.get(session_id).cloned())
    }
}
