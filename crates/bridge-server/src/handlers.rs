//! HTTP Handlers

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use bridge_erp::ReplicationOutcome;
use bridge_payments::{CheckoutRequest, PaymentError, WebhookEvent, SIGNATURE_HEADER};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub payment_gateway: String,
    pub erp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub url: String,
}

/// Webhook acknowledgement; `received` is true whenever the signature checked out
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub received: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales_order: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WebhookAck {
    fn received() -> Self {
        Self {
            received: true,
            ..Default::default()
        }
    }

    fn replicated(outcome: &ReplicationOutcome) -> Self {
        Self {
            received: true,
            customer: outcome.customer().map(str::to_string),
            sales_order: outcome.sales_order().map(str::to_string),
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            received: true,
            error: Some(error),
            ..Default::default()
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        payment_gateway: state.gateway.name().into(),
        erp: state.replicator.erp_name().into(),
    })
}

/// Create a hosted checkout session for the storefront cart
pub async fn create_checkout_session(
    State(state): State<AppState>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let Json(payload) = payload.map_err(|rejection| {
        tracing::info!(error = %rejection.body_text(), "Unreadable checkout request");
        api_error(StatusCode::BAD_REQUEST, "Invalid checkout request")
    })?;

    let session = state.checkout.create(&payload).await.map_err(|e| match e {
        PaymentError::Validation(_) => {
            tracing::info!(error = %e, "Checkout request rejected");
            api_error(StatusCode::BAD_REQUEST, e.user_message())
        }
        _ => {
            tracing::error!(error = %e, email = %payload.customer.email, "Checkout error");
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create checkout session",
            )
        }
    })?;

    Ok(Json(CheckoutResponse { url: session.url }))
}

/// Payment provider webhook
///
/// Takes the body as raw bytes: the signature covers them exactly as sent.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let event = state
        .gateway
        .verify_webhook(&body, signature)
        .map_err(|e| {
            tracing::warn!(error = %e, "Webhook rejected");
            api_error(StatusCode::BAD_REQUEST, e.user_message())
        })?;

    let session = match event.classify() {
        Ok(WebhookEvent::CheckoutCompleted(session)) => session,
        Ok(WebhookEvent::Other { event_type }) => {
            tracing::debug!(event_id = %event.id, event_type = %event_type, "Ignoring webhook event");
            return Ok(Json(WebhookAck::received()));
        }
        Err(e) => {
            tracing::error!(event_id = %event.id, error = %e, "Unreadable checkout session in webhook");
            return Ok(Json(WebhookAck::failed(e.to_string())));
        }
    };

    tracing::info!(
        event_id = %event.id,
        session_id = %session.id,
        email = session.customer_email.as_deref().unwrap_or_default(),
        "Checkout completed"
    );

    // Payment already succeeded; failures are acknowledged so the provider stops resending
    match state.replicator.handle(&session).await {
        Ok(outcome) => Ok(Json(WebhookAck::replicated(&outcome))),
        Err(e) => {
            tracing::error!(
                session_id = %session.id,
                error = %e,
                "ERP replication failed; needs manual reconciliation"
            );
            Ok(Json(WebhookAck::failed(e.to_string())))
        }
    }
}
