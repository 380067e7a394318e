//! REST endpoints for conversation management.
//!
//! Conversations are one-to-one between two users. Member order is normalized
//! (lexicographically smaller id is always member_a) to prevent duplicates.

use axum::{extract::State, http::StatusCode, Json};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::AuthUser;
use crate::db::models::ConversationRow;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    /// The other user's id
    pub member_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub id: String,
    pub members: Vec<String>,
    pub created_at: String,
}

impl From<ConversationRow> for ConversationResponse {
    fn from(row: ConversationRow) -> Self {
        Self {
            id: row.id,
            members: vec![row.member_a, row.member_b],
            created_at: row.created_at,
        }
    }
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        member_a: row.get(1)?,
        member_b: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Return the conversation between `user_a` and `user_b`, creating it if needed.
/// The flag is true when a new row was inserted.
pub fn find_or_create(
    conn: &Connection,
    user_a: &str,
    user_b: &str,
) -> rusqlite::Result<(bool, ConversationRow)> {
    let (member_a, member_b) = if user_a < user_b {
        (user_a, user_b)
    } else {
        (user_b, user_a)
    };

    let existing = conn
        .query_row(
            "SELECT id, member_a, member_b, created_at FROM conversations
             WHERE member_a = ?1 AND member_b = ?2",
            rusqlite::params![member_a, member_b],
            map_row,
        )
        .optional()?;

    if let Some(row) = existing {
        return Ok((false, row));
    }

    let row = ConversationRow {
        id: uuid::Uuid::now_v7().to_string(),
        member_a: member_a.to_string(),
        member_b: member_b.to_string(),
        created_at: super::now_timestamp(),
    };
    conn.execute(
        "INSERT INTO conversations (id, member_a, member_b, created_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![row.id, row.member_a, row.member_b, row.created_at],
    )?;
    Ok((true, row))
}

pub fn get(conn: &Connection, conversation_id: &str) -> rusqlite::Result<Option<ConversationRow>> {
    conn.query_row(
        "SELECT id, member_a, member_b, created_at FROM conversations WHERE id = ?1",
        rusqlite::params![conversation_id],
        map_row,
    )
    .optional()
}

/// Conversations the user belongs to, newest first.
pub fn list_for_user(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<ConversationRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, member_a, member_b, created_at FROM conversations
         WHERE member_a = ?1 OR member_b = ?1
         ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt.query_map(rusqlite::params![user_id], map_row)?;
    rows.collect()
}

/// POST /api/conversations: create or get the conversation with another user.
/// JWT auth required. Body: { "memberId": "<user id>" }.
pub async fn create_conversation(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<ConversationResponse>), (StatusCode, String)> {
    if body.member_id.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "memberId is required".to_string()));
    }
    if body.member_id == user.user_id {
        return Err((
            StatusCode::BAD_REQUEST,
            "Cannot start a conversation with yourself".to_string(),
        ));
    }

    let db = state.db.clone();
    let user_id = user.user_id.clone();
    let member_id = body.member_id;

    let (is_new, row) = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;
        find_or_create(&conn, &user_id, &member_id)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    if is_new {
        tracing::info!(
            conversation_id = %row.id,
            user_id = %user.user_id,
            "Conversation created"
        );
        Ok((StatusCode::CREATED, Json(row.into())))
    } else {
        Ok((StatusCode::OK, Json(row.into())))
    }
}

/// GET /api/conversations: list the caller's conversations. JWT auth required.
pub async fn list_conversations(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<ConversationResponse>>, StatusCode> {
    let db = state.db.clone();

    let rows = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        list_for_user(&conn, &user.user_id).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    Ok(Json(rows.into_iter().map(Into::into).collect()))
}
