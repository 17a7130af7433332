mod campaigns;
mod leads;

pub use campaigns::*;
pub use leads::*;

use axum::{
    Router,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;

use crate::db::AppState;
use crate::extractors::{Json, MaybeUser};
use crate::session::SessionUser;

use super::no_cache_headers;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapResponse {
    pub ok: bool,
    pub signed_in: bool,
    pub user: Option<SessionUser>,
}

/// Session probe for the UI. Never cached.
pub async fn bootstrap(MaybeUser(user): MaybeUser) -> impl IntoResponse {
    (
        no_cache_headers(),
        Json(BootstrapResponse {
            ok: true,
            signed_in: user.is_some(),
            user,
        }),
    )
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/bootstrap", get(bootstrap))
        .route("/api/lead", post(submit_lead))
        .route("/api/form", post(submit_work_form))
        .route("/api/email-capture", post(capture_email))
        .route("/api/campaigns/{slug}", get(get_campaign))
        .route("/api/campaigns/{slug}/totals", get(get_campaign_totals))
}
