//! # bridge-erp
//!
//! Replicates paid checkout sessions into ERPNext as a customer and a sales
//! order.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bridge_erp::{ErpNextClient, MemoryLedger, OrderDefaults, OrderReplicator};
//!
//! let replicator = OrderReplicator::new(
//!     Arc::new(ErpNextClient::from_env()?),
//!     Arc::new(MemoryLedger::new()),
//!     OrderDefaults::from_env()?,
//! );
//!
//! let outcome = replicator.handle(&completed_session).await?;
//! ```

mod client;
mod config;
mod error;
mod ledger;
mod model;
mod replicator;

pub use client::{ErpClient, ErpNextClient, MemoryErp};
pub use config::{ErpNextConfig, OrderDefaults};
pub use error::{ErpError, ReplicationError, Result};
pub use ledger::{
    Claim, MemoryLedger, ReplicationLedger, ReplicationStatus, DEFAULT_CLAIM_LEASE_SECS,
};
pub use model::{
    ExistingOrder, NewCustomer, SalesOrder, SalesOrderItem, CUSTOMER_TYPE_COMPANY,
    ORDER_TYPE_SALES,
};
pub use replicator::{
    build_sales_order, delivery_date, new_customer, OrderReplicator, ReplicationOutcome,
};
