//! Checkout bridge HTTP surface.
//!
//! | Method | Path                       | Purpose                          |
//! |--------|----------------------------|----------------------------------|
//! | GET    | `/health`                  | Health check                     |
//! | POST   | `/create-checkout-session` | Cart to hosted checkout URL      |
//! | POST   | `/webhook`                 | Signed payment provider events   |

pub mod config;
pub mod handlers;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{create_checkout_session, health_check, payment_webhook};
use crate::state::AppState;

/// Build the application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/create-checkout-session", post(create_checkout_session))
        .route("/webhook", post(payment_webhook))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
