/// Database row types for the archive tables.
/// These correspond 1:1 to the SQLite schema defined in migrations.rs.

/// Conversation record in the conversations table
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationRow {
    pub id: String,
    pub member_a: String,
    pub member_b: String,
    pub created_at: String,
}

impl ConversationRow {
    pub fn has_member(&self, user_id: &str) -> bool {
        self.member_a == user_id || self.member_b == user_id
    }
}

/// Message record in the messages table
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub text: String,
    pub created_at: String,
}
