pub mod paypal;

pub use paypal::{handle_paypal_webhook, process_event};

use axum::{Router, routing::post};

use crate::db::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/webhooks/paypal", post(handle_paypal_webhook))
}
