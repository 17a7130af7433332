//! Hemp'in Fund - crowdfunding backend
//!
//! Lead capture, pledge intents, PayPal checkout and webhook reconciliation
//! for fund.hempin.org. Sessions are issued by the shared identity provider;
//! this crate only verifies them.

pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod payments;
pub mod reconcile;
pub mod session;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::db::AppState;

/// Full application router. Debug endpoints are mounted only in dev mode.
pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        .merge(handlers::public::router())
        .merge(handlers::pledges::router())
        .merge(handlers::webhooks::router());

    if state.dev_mode {
        router = router.merge(handlers::dev::router());
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
