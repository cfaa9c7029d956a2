//! ERP Document Models
//!
//! Request bodies for the ERPNext `Customer` and `Sales Order` doctypes.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Customer classification used for storefront buyers
pub const CUSTOMER_TYPE_COMPANY: &str = "Company";

/// Order type for storefront orders
pub const ORDER_TYPE_SALES: &str = "Sales";

/// New customer document
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "doctype", rename = "Customer")]
pub struct NewCustomer {
    pub customer_name: String,
    pub customer_type: String,
    pub customer_group: String,
    pub territory: String,
    pub email_id: String,
    pub mobile_no: String,
    pub custom_company_name: String,
}

/// Sales order line
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SalesOrderItem {
    pub item_code: String,
    pub item_name: String,
    pub qty: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,
    pub delivery_date: NaiveDate,
}

/// New sales order document
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "doctype", rename = "Sales Order")]
pub struct SalesOrder {
    pub customer: String,
    pub company: String,
    pub transaction_date: NaiveDate,
    pub delivery_date: NaiveDate,
    pub order_type: String,
    pub items: Vec<SalesOrderItem>,
    pub shipping_address_name: String,
    pub custom_project_name: String,
    pub custom_delivery_address: String,
    pub custom_notes: String,
    pub custom_stripe_session_id: String,
    pub custom_stripe_payment_intent: String,
}

/// Sales order already stamped with a checkout session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingOrder {
    pub name: String,
    #[serde(default)]
    pub customer: String,
}
