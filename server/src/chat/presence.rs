//! Presence lookups over HTTP.
//!
//! Presence itself lives in the relay's registry; this only reads it.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::AuthUser;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceResponse {
    pub user_id: String,
    pub online: bool,
}

/// GET /api/presence/{user_id}: whether a user currently has a live connection.
/// JWT auth required.
pub async fn get_presence(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(user_id): Path<String>,
) -> Json<PresenceResponse> {
    let online = state.presence().is_online(&user_id);
    Json(PresenceResponse { user_id, online })
}
