use axum::{Router, extract::State, response::IntoResponse, routing::get};
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::{Json, MaybeUser};
use crate::models::Profile;
use crate::session::SessionUser;

use super::no_cache_headers;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoAmIResponse {
    pub ok: bool,
    pub session_enabled: bool,
    pub user: Option<SessionUser>,
    pub profile: Option<Profile>,
}

/// GET /api/debug/whoami
///
/// Shows what the server makes of the caller's session cookie. Dev mode only.
pub async fn whoami(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> Result<impl IntoResponse> {
    let profile = match &user {
        Some(user) => {
            let conn = state.db.get()?;
            queries::get_profile_by_user_id(&conn, &user.id)?
        }
        None => None,
    };

    Ok((
        no_cache_headers(),
        Json(WhoAmIResponse {
            ok: true,
            session_enabled: state.sessions.is_enabled(),
            user,
            profile,
        }),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/debug/whoami", get(whoami))
}
