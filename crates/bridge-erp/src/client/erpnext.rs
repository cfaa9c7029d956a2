//! ERPNext REST Client
//!
//! Talks to the Frappe resource API (`/api/resource/<doctype>`) with token
//! authentication. Reads retry on any transient failure; creates retry only
//! when the request cannot have been applied.

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::ErpClient;
use crate::config::ErpNextConfig;
use crate::error::{ErpError, Result};
use crate::model::{ExistingOrder, NewCustomer, SalesOrder};

const CUSTOMER: &str = "Customer";
const SALES_ORDER: &str = "Sales Order";

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct NamedDoc {
    name: String,
}

/// ERPNext client
pub struct ErpNextClient {
    http: Client,
    config: ErpNextConfig,
}

impl ErpNextClient {
    pub fn new(config: ErpNextConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(ErpNextConfig::from_env()?)
    }

    fn resource_url(&self, doctype: &str) -> String {
        format!(
            "{}/api/resource/{doctype}",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn auth_header(&self) -> String {
        format!("token {}:{}", self.config.api_key, self.config.api_secret)
    }

    /// `[["field","=",value]]` with proper JSON escaping
    fn equals_filter(field: &str, value: &str) -> String {
        serde_json::json!([[field, "=", value]]).to_string()
    }

    async fn call<T, F>(&self, idempotent: bool, build: F) -> Result<T>
    where
        T: DeserializeOwned + Send,
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut attempt = 1;
        loop {
            match self.execute(build()).await {
                Err(e)
                    if attempt < self.config.max_attempts
                        && if idempotent {
                            e.is_retryable()
                        } else {
                            e.is_safe_to_resend()
                        } =>
                {
                    tracing::warn!(attempt, error = %e, "ERP call failed, retrying");
                    tokio::time::sleep(self.config.backoff * attempt).await;
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .header(AUTHORIZATION, self.auth_header())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ErpError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| ErpError::Parse(e.to_string()))?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl ErpClient for ErpNextClient {
    async fn create_customer(&self, customer: &NewCustomer) -> Result<String> {
        let url = self.resource_url(CUSTOMER);
        let doc: NamedDoc = self
            .call(false, || self.http.post(&url).json(customer))
            .await?;
        Ok(doc.name)
    }

    async fn find_customer_by_email(&self, email: &str) -> Result<Option<String>> {
        let url = self.resource_url(CUSTOMER);
        let filters = Self::equals_filter("email_id", email);
        let docs: Vec<NamedDoc> = self
            .call(true, || {
                self.http
                    .get(&url)
                    .query(&[("filters", filters.as_str()), ("limit", "1")])
            })
            .await?;
        Ok(docs.into_iter().next().map(|doc| doc.name))
    }

    async fn create_sales_order(&self, order: &SalesOrder) -> Result<String> {
        let url = self.resource_url(SALES_ORDER);
        let doc: NamedDoc = self
            .call(false, || self.http.post(&url).json(order))
            .await?;
        Ok(doc.name)
    }

    async fn find_sales_order_by_session(&self, session_id: &str) -> Result<Option<ExistingOrder>> {
        let url = self.resource_url(SALES_ORDER);
        let filters = Self::equals_filter("custom_stripe_session_id", session_id);
        let docs: Vec<ExistingOrder> = self
            .call(true, || {
                self.http.get(&url).query(&[
                    ("filters", filters.as_str()),
                    ("fields", r#"["name","customer"]"#),
                    ("limit", "1"),
                ])
            })
            .await?;
        Ok(docs.into_iter().next())
    }

    fn name(&self) -> &str {
        "ERPNext"
    }
}
