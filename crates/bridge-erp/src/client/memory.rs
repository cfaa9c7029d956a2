//! In-Memory ERP
//!
//! For local development and tests. Mirrors the ERPNext behaviours the
//! replicator relies on: customer names are unique, and failures surface as
//! upstream errors with a body.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::ErpClient;
use crate::error::{ErpError, Result};
use crate::model::{ExistingOrder, NewCustomer, SalesOrder};

#[derive(Default)]
struct Books {
    customers: Vec<(String, NewCustomer)>,
    orders: Vec<(String, SalesOrder)>,
    reject_customers: bool,
    reject_orders: Option<String>,
    customer_creates: usize,
}

/// In-memory ERP (for development)
#[derive(Default)]
pub struct MemoryErp {
    books: RwLock<Books>,
}

impl MemoryErp {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Books> {
        self.books.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Books> {
        self.books.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a customer directly, as another writer would
    pub fn seed_customer(&self, customer: NewCustomer) -> String {
        let mut books = self.write();
        let id = format!("CUST-{:04}", books.customers.len() + 1);
        books.customers.push((id.clone(), customer));
        id
    }

    /// Make every customer create fail with a conflict
    pub fn reject_customer_creates(&self, reject: bool) {
        self.write().reject_customers = reject;
    }

    /// Make every sales order create fail with `body`
    pub fn reject_sales_orders(&self, body: Option<String>) {
        self.write().reject_orders = body;
    }

    pub fn customers(&self) -> Vec<(String, NewCustomer)> {
        self.read().customers.clone()
    }

    pub fn sales_orders(&self) -> Vec<(String, SalesOrder)> {
        self.read().orders.clone()
    }

    /// Create attempts seen, successful or not
    pub fn customer_create_attempts(&self) -> usize {
        self.read().customer_creates
    }
}

#[async_trait]
impl ErpClient for MemoryErp {
    async fn create_customer(&self, customer: &NewCustomer) -> Result<String> {
        let mut books = self.write();
        books.customer_creates += 1;

        let duplicate = books
            .customers
            .iter()
            .any(|(_, existing)| existing.customer_name == customer.customer_name);
        if books.reject_customers || duplicate {
            return Err(ErpError::Upstream {
                status: 409,
                body: format!(
                    "DuplicateEntryError: Customer {} already exists",
                    customer.customer_name
                ),
            });
        }

        let id = format!("CUST-{:04}", books.customers.len() + 1);
        books.customers.push((id.clone(), customer.clone()));
        Ok(id)
    }

    async fn find_customer_by_email(&self, email: &str) -> Result<Option<String>> {
        Ok(self
            .read()
            .customers
            .iter()
            .find(|(_, c)| c.email_id == email)
            .map(|(id, _)| id.clone()))
    }

    async fn create_sales_order(&self, order: &SalesOrder) -> Result<String> {
        let mut books = self.write();
        if let Some(body) = &books.reject_orders {
            return Err(ErpError::Upstream {
                status: 417,
                body: body.clone(),
            });
        }

        let id = format!("SAL-ORD-{:04}", books.orders.len() + 1);
        books.orders.push((id.clone(), order.clone()));
        Ok(id)
    }

    async fn find_sales_order_by_session(&self, session_id: &str) -> Result<Option<ExistingOrder>> {
        Ok(self
            .read()
            .orders
            .iter()
            .find(|(_, o)| o.custom_stripe_session_id == session_id)
            .map(|(name, o)| ExistingOrder {
                name: name.clone(),
                customer: o.customer.clone(),
            }))
    }

    fn name(&self) -> &str {
        "MemoryERP"
    }
}
