//! Order Replication
//!
//! Turns a completed checkout session into an ERP customer and sales order.
//!
//! Order of work for one session:
//!
//! 1. Claim the session in the ledger (duplicates stop here)
//! 2. Decode the cart; nothing is created when it is unreadable
//! 3. Skip if the ERP already holds an order stamped with the session id
//! 4. Find or create the customer by email, recording it in the ledger
//! 5. Create the sales order
//!
//! A failure after step 4 leaves a customer without an order. The ledger keeps
//! the customer id so a resent event reuses it.

use std::sync::Arc;

use bridge_payments::metadata::{self, keys};
use bridge_payments::{CartItem, CheckoutMetadata, CompletedSession};
use chrono::{Days, NaiveDate, Utc};
use serde::Serialize;

use crate::client::ErpClient;
use crate::config::OrderDefaults;
use crate::error::ReplicationError;
use crate::ledger::{Claim, ReplicationLedger};
use crate::model::{
    NewCustomer, SalesOrder, SalesOrderItem, CUSTOMER_TYPE_COMPANY, ORDER_TYPE_SALES,
};

/// What handling one completed session produced
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReplicationOutcome {
    Replicated { customer: String, sales_order: String },

    /// Redelivery of a session that was already replicated
    AlreadyReplicated { customer: String, sales_order: String },

    /// Redelivery while another delivery is still replicating
    InFlight,
}

impl ReplicationOutcome {
    /// ERP customer, when one is known
    pub fn customer(&self) -> Option<&str> {
        match self {
            Self::Replicated { customer, .. } | Self::AlreadyReplicated { customer, .. } => {
                Some(customer.as_str()).filter(|c| !c.is_empty())
            }
            Self::InFlight => None,
        }
    }

    pub fn sales_order(&self) -> Option<&str> {
        match self {
            Self::Replicated { sales_order, .. } | Self::AlreadyReplicated { sales_order, .. } => {
                Some(sales_order)
            }
            Self::InFlight => None,
        }
    }
}

/// Replicates paid sessions into the ERP
pub struct OrderReplicator {
    erp: Arc<dyn ErpClient>,
    ledger: Arc<dyn ReplicationLedger>,
    defaults: OrderDefaults,
}

impl OrderReplicator {
    pub fn new(
        erp: Arc<dyn ErpClient>,
        ledger: Arc<dyn ReplicationLedger>,
        defaults: OrderDefaults,
    ) -> Self {
        Self {
            erp,
            ledger,
            defaults,
        }
    }

    pub fn erp_name(&self) -> &str {
        self.erp.name()
    }

    /// Handle a verified `checkout.session.completed`
    pub async fn handle(
        &self,
        session: &CompletedSession,
    ) -> Result<ReplicationOutcome, ReplicationError> {
        let known_customer = match self.ledger.claim(&session.id)? {
            Claim::AlreadyReplicated {
                customer,
                sales_order,
            } => {
                tracing::info!(
                    session_id = %session.id,
                    customer = %customer,
                    sales_order = %sales_order,
                    "Session already replicated, skipping"
                );
                return Ok(ReplicationOutcome::AlreadyReplicated {
                    customer,
                    sales_order,
                });
            }
            Claim::InFlight => {
                tracing::info!(session_id = %session.id, "Session replication already in flight");
                return Ok(ReplicationOutcome::InFlight);
            }
            Claim::Acquired { customer } => customer,
        };

        match self.replicate(session, known_customer).await {
            Ok((customer, sales_order)) => {
                self.ledger.complete(&session.id, &customer, &sales_order)?;
                tracing::info!(
                    session_id = %session.id,
                    customer = %customer,
                    sales_order = %sales_order,
                    "Session replicated to ERP"
                );
                Ok(ReplicationOutcome::Replicated {
                    customer,
                    sales_order,
                })
            }
            Err(e) => {
                if let Err(ledger_err) = self.ledger.fail(&session.id, &e.to_string()) {
                    tracing::error!(session_id = %session.id, error = %ledger_err, "Could not record replication failure");
                }
                Err(e)
            }
        }
    }

    async fn replicate(
        &self,
        session: &CompletedSession,
        known_customer: Option<String>,
    ) -> Result<(String, String), ReplicationError> {
        let cart = metadata::decode_cart(&session.metadata)
            .map_err(|e| ReplicationError::Parse(e.to_string()))?;
        if cart.is_empty() {
            return Err(ReplicationError::Parse(
                "cart metadata carried no items".into(),
            ));
        }

        if let Some(existing) = self.erp.find_sales_order_by_session(&session.id).await? {
            tracing::warn!(
                session_id = %session.id,
                sales_order = %existing.name,
                "ERP already holds an order for this session"
            );
            let customer = match known_customer {
                _ if !existing.customer.is_empty() => existing.customer,
                Some(customer) => customer,
                None => {
                    let email = metadata::decode_customer(&session.metadata).email;
                    if email.is_empty() {
                        String::new()
                    } else {
                        self.erp.find_customer_by_email(&email).await?.unwrap_or_default()
                    }
                }
            };
            return Ok((customer, existing.name));
        }

        let customer = if let Some(customer) = known_customer {
            tracing::info!(session_id = %session.id, customer = %customer, "Reusing customer from earlier attempt");
            customer
        } else {
            let customer = self.find_or_create_customer(&session.metadata).await?;
            self.ledger.record_customer(&session.id, &customer)?;
            customer
        };

        let order = build_sales_order(
            &customer,
            &cart,
            session,
            &self.defaults,
            Utc::now().date_naive(),
        );

        let sales_order = self.erp.create_sales_order(&order).await.map_err(|e| {
            tracing::error!(
                session_id = %session.id,
                customer = %customer,
                error = %e,
                "Sales order creation failed; customer left without an order"
            );
            e
        })?;

        Ok((customer, sales_order))
    }

    /// Look the customer up by email, creating it when absent
    ///
    /// A failed create is followed by another lookup, since a concurrent
    /// delivery may have created the same customer in between.
    pub async fn find_or_create_customer(
        &self,
        metadata: &CheckoutMetadata,
    ) -> Result<String, ReplicationError> {
        let new_customer = new_customer(metadata, &self.defaults);
        if new_customer.email_id.is_empty() {
            return Err(ReplicationError::Parse(
                "customer_email missing from metadata".into(),
            ));
        }

        if let Some(id) = self.erp.find_customer_by_email(&new_customer.email_id).await? {
            tracing::info!(customer = %id, email = %new_customer.email_id, "Found existing ERP customer");
            return Ok(id);
        }

        let attempts = self.defaults.customer_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.erp.create_customer(&new_customer).await {
                Ok(id) => {
                    tracing::info!(customer = %id, email = %new_customer.email_id, "Created ERP customer");
                    return Ok(id);
                }
                Err(create_err) => {
                    tracing::warn!(
                        attempt,
                        email = %new_customer.email_id,
                        error = %create_err,
                        "Customer create failed, searching by email"
                    );
                    if let Some(id) = self.erp.find_customer_by_email(&new_customer.email_id).await? {
                        tracing::info!(customer = %id, email = %new_customer.email_id, "Found existing ERP customer");
                        return Ok(id);
                    }
                    if attempt >= attempts {
                        return Err(create_err.into());
                    }
                    attempt += 1;
                }
            }
        }
    }
}

/// Customer document from session metadata
pub fn new_customer(metadata: &CheckoutMetadata, defaults: &OrderDefaults) -> NewCustomer {
    let customer = metadata::decode_customer(metadata);
    let mut name = customer.display_name();
    if name.is_empty() {
        name.clone_from(&customer.email);
    }

    NewCustomer {
        customer_type: CUSTOMER_TYPE_COMPANY.into(),
        customer_group: defaults.customer_group.clone(),
        territory: defaults.territory.clone(),
        email_id: customer.email,
        mobile_no: customer.phone,
        custom_company_name: customer.company.unwrap_or_else(|| name.clone()),
        customer_name: name,
    }
}

/// Requested delivery date, or `today` plus the lead time
pub fn delivery_date(metadata: &CheckoutMetadata, today: NaiveDate, lead_time_days: u64) -> NaiveDate {
    let fallback = today.checked_add_days(Days::new(lead_time_days)).unwrap_or(today);
    let raw = metadata.get(keys::DELIVERY_DATE).trim();
    if raw.is_empty() {
        return fallback;
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap_or_else(|_| {
        tracing::warn!(delivery_date = raw, "Unreadable delivery date, using default lead time");
        fallback
    })
}

/// Sales order document for a decoded cart
pub fn build_sales_order(
    customer: &str,
    cart: &[CartItem],
    session: &CompletedSession,
    defaults: &OrderDefaults,
    today: NaiveDate,
) -> SalesOrder {
    let metadata = &session.metadata;
    let project = metadata::decode_project(metadata);
    let delivery = delivery_date(metadata, today, defaults.lead_time_days);

    SalesOrder {
        customer: customer.to_string(),
        company: defaults.company.clone(),
        transaction_date: today,
        delivery_date: delivery,
        order_type: ORDER_TYPE_SALES.into(),
        items: cart
            .iter()
            .map(|item| SalesOrderItem {
                item_code: item.item_code.clone(),
                item_name: item.name.clone(),
                qty: item.quantity,
                rate: item.unit_price,
                delivery_date: delivery,
            })
            .collect(),
        shipping_address_name: project.delivery_address.street.clone(),
        custom_project_name: project.project_name,
        custom_delivery_address: project.delivery_address.formatted(),
        custom_notes: project.notes,
        custom_stripe_session_id: session.id.clone(),
        custom_stripe_payment_intent: session.payment_intent.clone().unwrap_or_default(),
    }
}
