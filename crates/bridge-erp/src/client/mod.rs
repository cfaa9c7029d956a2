//! ERP Integration
//!
//! Abstraction over the back-office system of record.

mod erpnext;
mod memory;

pub use erpnext::ErpNextClient;
pub use memory::MemoryErp;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{ExistingOrder, NewCustomer, SalesOrder};

/// ERP client trait (Strategy pattern)
#[async_trait]
pub trait ErpClient: Send + Sync {
    /// Create a customer, returning its ERP identifier
    async fn create_customer(&self, customer: &NewCustomer) -> Result<String>;

    /// Look up a customer identifier by email
    async fn find_customer_by_email(&self, email: &str) -> Result<Option<String>>;

    /// Create a sales order, returning its ERP identifier
    async fn create_sales_order(&self, order: &SalesOrder) -> Result<String>;

    /// Sales order already stamped with this checkout session, if any
    async fn find_sales_order_by_session(&self, session_id: &str) -> Result<Option<ExistingOrder>>;

    /// ERP name
    fn name(&self) -> &str;
}
