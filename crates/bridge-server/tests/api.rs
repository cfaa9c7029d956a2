//! HTTP surface tests: checkout session creation and webhook replication

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

use bridge_erp::{MemoryErp, MemoryLedger, OrderDefaults, OrderReplicator};
use bridge_payments::{
    CheckoutMetadata, CheckoutUrls, GatewayEvent, PaymentError, PaymentGateway, PaymentSession,
    SessionRequest, WebhookVerifier, SIGNATURE_HEADER,
};
use bridge_server::router;
use bridge_server::state::AppState;

const WEBHOOK_SECRET: &str = "whsec_test123secret456";
const SESSION_ID: &str = "cs_test_a1B2c3";

// ============ Test Harness ============

#[derive(Default)]
struct RecordingGateway {
    requests: Mutex<Vec<SessionRequest>>,
    unavailable: bool,
}

impl RecordingGateway {
    fn requests(&self) -> Vec<SessionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn create_session(&self, request: SessionRequest) -> bridge_payments::Result<PaymentSession> {
        self.requests.lock().unwrap().push(request);
        if self.unavailable {
            return Err(PaymentError::Gateway("api_connection_error: sk_test_leak".into()));
        }
        Ok(PaymentSession {
            id: SESSION_ID.into(),
            url: format!("https://checkout.stripe.com/c/pay/{SESSION_ID}"),
        })
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> bridge_payments::Result<GatewayEvent> {
        WebhookVerifier::new(WEBHOOK_SECRET).verify(payload, signature)
    }

    fn name(&self) -> &str {
        "Recording"
    }
}

struct Harness {
    app: Router,
    gateway: Arc<RecordingGateway>,
    erp: Arc<MemoryErp>,
}

fn harness_with(gateway: RecordingGateway) -> Harness {
    let gateway = Arc::new(gateway);
    let erp = Arc::new(MemoryErp::new());
    let replicator = OrderReplicator::new(
        erp.clone(),
        Arc::new(MemoryLedger::new()),
        OrderDefaults {
            company: "Acme SIPs".into(),
            ..Default::default()
        },
    );
    let state = AppState::new(
        gateway.clone(),
        CheckoutUrls::for_storefront("https://shop.example"),
        replicator,
    );

    Harness {
        app: router(state),
        gateway,
        erp,
    }
}

fn harness() -> Harness {
    harness_with(RecordingGateway::default())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response should be JSON")
    };
    (status, body)
}

fn checkout_request(body: &Value) -> Request<Body> {
    Request::post("/create-checkout-session")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn webhook_request(payload: &[u8], signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::post("/webhook").header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder.body(Body::from(payload.to_vec())).unwrap()
}

fn sign(payload: &[u8]) -> String {
    WebhookVerifier::new(WEBHOOK_SECRET)
        .sign(payload, chrono::Utc::now().timestamp())
        .unwrap()
}

fn completed_event(metadata: &CheckoutMetadata) -> Vec<u8> {
    json!({
        "id": "evt_1",
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": SESSION_ID,
                "payment_intent": "pi_1",
                "customer_email": "a@b.com",
                "metadata": metadata,
            }
        }
    })
    .to_string()
    .into_bytes()
}

fn wall_panel_checkout() -> Value {
    json!({
        "cart": [
            {"itemCode": "SIPS-WALL-4X24", "name": "SIP Wall Panel", "unitPrice": 1250, "quantity": 2}
        ],
        "customer": {
            "firstName": "Ada",
            "lastName": "Builder",
            "email": "a@b.com",
            "phone": "555-0100"
        },
        "project": {
            "projectName": "Lakeside Cabin",
            "deliveryAddress": {"street": "12 Timber Rd", "city": "Bend", "state": "OR", "zip": "97701"},
            "estimatedDeliveryDate": "2026-11-30",
            "notes": "Gate code 4411"
        }
    })
}

// ============ Checkout Session Tests ============

#[tokio::test]
async fn test_empty_cart_rejected_without_gateway_call() {
    let h = harness();
    let (status, body) = send(
        &h.app,
        checkout_request(&json!({"cart": [], "customer": {"email": "a@b.com"}})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Cart is empty"}));
    assert!(h.gateway.requests().is_empty());
}

#[tokio::test]
async fn test_null_cart_reads_as_empty() {
    let h = harness();
    let (status, body) = send(
        &h.app,
        checkout_request(&json!({"cart": null, "customer": {"email": "a@b.com"}, "project": null})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Cart is empty"}));
    assert!(h.gateway.requests().is_empty());
}

#[tokio::test]
async fn test_unreadable_checkout_body_gets_json_error() {
    let h = harness();
    let mut fractional = wall_panel_checkout();
    fractional["cart"][0]["quantity"] = json!(1.5);

    let (status, body) = send(&h.app, checkout_request(&fractional)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Invalid checkout request"}));

    let not_json = Request::post("/create-checkout-session")
        .header("content-type", "application/json")
        .body(Body::from("{cart:"))
        .unwrap();
    let (status, body) = send(&h.app, not_json).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Invalid checkout request"}));

    let no_content_type = Request::post("/create-checkout-session")
        .body(Body::from(wall_panel_checkout().to_string()))
        .unwrap();
    let (status, body) = send(&h.app, no_content_type).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Invalid checkout request"}));

    assert!(h.gateway.requests().is_empty());
}

#[tokio::test]
async fn test_checkout_returns_hosted_url() {
    let h = harness();
    let (status, body) = send(&h.app, checkout_request(&wall_panel_checkout())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"url": format!("https://checkout.stripe.com/c/pay/{SESSION_ID}")})
    );

    let requests = h.gateway.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.line_items.len(), 1);
    assert_eq!(request.line_items[0].unit_amount, 125_000);
    assert_eq!(request.line_items[0].quantity, 2);
    assert_eq!(
        request.success_url,
        "https://shop.example/success?session_id={CHECKOUT_SESSION_ID}"
    );
    assert_eq!(request.cancel_url, "https://shop.example/checkout");
    assert_eq!(request.customer_email.as_deref(), Some("a@b.com"));

    let cart = bridge_payments::metadata::decode_cart(&request.metadata).unwrap();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].item_code, "SIPS-WALL-4X24");
    assert_eq!(cart[0].unit_price, dec!(1250));
}

#[tokio::test]
async fn test_gateway_failure_is_generic_500() {
    let h = harness_with(RecordingGateway {
        unavailable: true,
        ..Default::default()
    });
    let (status, body) = send(&h.app, checkout_request(&wall_panel_checkout())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Failed to create checkout session"}));
}

// ============ Webhook Tests ============

#[tokio::test]
async fn test_paid_checkout_replicates_once() {
    let h = harness();
    send(&h.app, checkout_request(&wall_panel_checkout())).await;
    let metadata = h.gateway.requests()[0].metadata.clone();

    let payload = completed_event(&metadata);
    let signature = sign(&payload);
    let (status, body) = send(&h.app, webhook_request(&payload, Some(&signature))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"received": true, "customer": "CUST-0001", "salesOrder": "SAL-ORD-0001"})
    );

    let orders = h.erp.sales_orders();
    assert_eq!(orders.len(), 1);
    let order = &orders[0].1;
    assert_eq!(order.items[0].item_code, "SIPS-WALL-4X24");
    assert_eq!(order.items[0].qty, 2);
    assert_eq!(order.items[0].rate, dec!(1250));
    assert_eq!(order.custom_stripe_session_id, SESSION_ID);
    assert_eq!(h.erp.customers()[0].1.email_id, "a@b.com");

    // Provider resends the same event
    let (status, body) = send(&h.app, webhook_request(&payload, Some(&signature))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"received": true, "customer": "CUST-0001", "salesOrder": "SAL-ORD-0001"})
    );
    assert_eq!(h.erp.sales_orders().len(), 1);
    assert_eq!(h.erp.customer_create_attempts(), 1);
}

#[tokio::test]
async fn test_missing_signature_rejected() {
    let h = harness();
    let payload = completed_event(&CheckoutMetadata::default());
    let (status, body) = send(&h.app, webhook_request(&payload, None)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Missing stripe-signature header"}));
    assert_eq!(h.erp.customer_create_attempts(), 0);
}

#[tokio::test]
async fn test_tampered_payload_rejected() {
    let h = harness();
    let payload = completed_event(&CheckoutMetadata::default());
    let signature = sign(&payload);
    let mut tampered = payload.clone();
    tampered.extend_from_slice(b" ");

    let (status, body) = send(&h.app, webhook_request(&tampered, Some(&signature))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Webhook signature verification failed"}));
    assert!(h.erp.sales_orders().is_empty());
}

#[tokio::test]
async fn test_other_events_acknowledged() {
    let h = harness();
    let payload = br#"{"id":"evt_2","type":"payment_intent.created","data":{"object":{}}}"#;
    let (status, body) = send(&h.app, webhook_request(payload, Some(&sign(payload)))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"received": true}));
    assert_eq!(h.erp.customer_create_attempts(), 0);
}

#[tokio::test]
async fn test_truncated_cart_acknowledged_with_error() {
    let h = harness();
    let cart: Vec<Value> = (0..15)
        .map(|i| {
            json!({
                "itemCode": format!("SIPS-WALL-{i:03}"),
                "name": "SIP Wall Panel 4x24",
                "unitPrice": 1250,
                "quantity": 1
            })
        })
        .collect();
    let mut checkout = wall_panel_checkout();
    checkout["cart"] = Value::Array(cart);

    let (status, _) = send(&h.app, checkout_request(&checkout)).await;
    assert_eq!(status, StatusCode::OK);

    let metadata = h.gateway.requests()[0].metadata.clone();
    assert!(metadata.get("cart_items").chars().count() <= 490);

    let payload = completed_event(&metadata);
    let (status, body) = send(&h.app, webhook_request(&payload, Some(&sign(&payload)))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
    assert!(body["error"]
        .as_str()
        .is_some_and(|e| e.starts_with("Invalid cart data")));
    assert_eq!(h.erp.customer_create_attempts(), 0);
}

#[tokio::test]
async fn test_order_rejection_acknowledged_with_upstream_detail() {
    let h = harness();
    send(&h.app, checkout_request(&wall_panel_checkout())).await;
    let metadata = h.gateway.requests()[0].metadata.clone();
    h.erp
        .reject_sales_orders(Some("Item SIPS-WALL-4X24 is disabled".into()));

    let payload = completed_event(&metadata);
    let (status, body) = send(&h.app, webhook_request(&payload, Some(&sign(&payload)))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
    assert!(body["error"]
        .as_str()
        .is_some_and(|e| e.contains("Item SIPS-WALL-4X24 is disabled")));
    assert_eq!(h.erp.customers().len(), 1);
}

// ============ Health ============

#[tokio::test]
async fn test_health_reports_collaborators() {
    let h = harness();
    let (status, body) = send(
        &h.app,
        Request::get("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["payment_gateway"], "Recording");
    assert_eq!(body["erp"], "MemoryERP");
}
