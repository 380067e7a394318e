//! REST endpoints for storing and retrieving conversation messages.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::auth::middleware::AuthUser;
use crate::db::models::MessageRow;
use crate::dm::conversations;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveMessageRequest {
    pub conversation_id: String,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: String,
    pub conversation_id: String,
    pub sender: String,
    pub text: String,
    pub created_at: String,
}

impl From<MessageRow> for MessageResponse {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            conversation_id: row.conversation_id,
            sender: row.sender_id,
            text: row.text,
            created_at: row.created_at,
        }
    }
}

pub fn insert(
    conn: &Connection,
    conversation_id: &str,
    sender_id: &str,
    text: &str,
) -> rusqlite::Result<MessageRow> {
    let row = MessageRow {
        id: uuid::Uuid::now_v7().to_string(),
        conversation_id: conversation_id.to_string(),
        sender_id: sender_id.to_string(),
        text: text.to_string(),
        created_at: super::now_timestamp(),
    };
    conn.execute(
        "INSERT INTO messages (id, conversation_id, sender_id, text, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            row.id,
            row.conversation_id,
            row.sender_id,
            row.text,
            row.created_at
        ],
    )?;
    Ok(row)
}

/// Messages of a conversation, oldest first. UUIDv7 ids break timestamp ties.
pub fn list(conn: &Connection, conversation_id: &str) -> rusqlite::Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, conversation_id, sender_id, text, created_at FROM messages
         WHERE conversation_id = ?1
         ORDER BY created_at ASC, id ASC",
    )?;
    let rows = stmt.query_map(rusqlite::params![conversation_id], |row| {
        Ok(MessageRow {
            id: row.get(0)?,
            conversation_id: row.get(1)?,
            sender_id: row.get(2)?,
            text: row.get(3)?,
            created_at: row.get(4)?,
        })
    })?;
    rows.collect()
}

/// Look up the conversation and check that `user_id` belongs to it.
fn require_member(
    conn: &Connection,
    conversation_id: &str,
    user_id: &str,
) -> Result<(), (StatusCode, String)> {
    let conversation = conversations::get(conn, conversation_id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "Conversation not found".to_string()))?;

    if !conversation.has_member(user_id) {
        return Err((
            StatusCode::FORBIDDEN,
            "Not a member of this conversation".to_string(),
        ));
    }
    Ok(())
}

/// POST /api/messages: persist a message. JWT auth required.
/// The sender is the authenticated caller. Body: { "conversationId", "text" }.
pub async fn save_message(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<SaveMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), (StatusCode, String)> {
    if body.text.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "text must not be empty".to_string()));
    }

    let db = state.db.clone();
    let user_id = user.user_id.clone();

    let row = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;
        require_member(&conn, &body.conversation_id, &user_id)?;
        insert(&conn, &body.conversation_id, &user_id, &body.text)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    tracing::debug!(
        conversation_id = %row.conversation_id,
        user_id = %user.user_id,
        "Message archived"
    );

    Ok((StatusCode::CREATED, Json(row.into())))
}

/// GET /api/messages/{conversation_id}: message history, oldest first.
/// JWT auth required; caller must be a member of the conversation.
pub async fn get_messages(
    State(state): State<AppState>,
    user: AuthUser,
    Path(conversation_id): Path<String>,
) -> Result<Json<Vec<MessageResponse>>, (StatusCode, String)> {
    let db = state.db.clone();

    let rows = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;
        require_member(&conn, &conversation_id, &user.user_id)?;
        list(&conn, &conversation_id).map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_db;

    #[test]
    fn test_history_is_oldest_first() {
        let db = init_memory_db().unwrap();
        let conn = db.lock().unwrap();
        let (_, conv) = conversations::find_or_create(&conn, "a1", "b2").unwrap();

        insert(&conn, &conv.id, "a1", "first").unwrap();
        insert(&conn, &conv.id, "b2", "second").unwrap();
        insert(&conn, &conv.id, "a1", "third").unwrap();

        let texts: Vec<String> = list(&conn, &conv.id)
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_require_member() {
        let db = init_memory_db().unwrap();
        let conn = db.lock().unwrap();
        let (_, conv) = conversations::find_or_create(&conn, "a1", "b2").unwrap();

        assert!(require_member(&conn, &conv.id, "b2").is_ok());
        assert_eq!(
            require_member(&conn, &conv.id, "c3").unwrap_err().0,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            require_member(&conn, "missing", "a1").unwrap_err().0,
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_insert_into_unknown_conversation_fails() {
        let db = init_memory_db().unwrap();
        let conn = db.lock().unwrap();
        assert!(insert(&conn, "missing", "a1", "hi").is_err());
    }
}
