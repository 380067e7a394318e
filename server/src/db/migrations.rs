use rusqlite_migration::{Migrations, M};

/// Define all schema migrations.
/// Uses SQLite user_version pragma for tracking, no migration table needed.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        "-- Migration 1: Message archive

-- One-to-one conversations. Member order is normalized
-- (member_a < member_b) so each pair has exactly one row.
CREATE TABLE conversations (
    id TEXT PRIMARY KEY,
    member_a TEXT NOT NULL,
    member_b TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(member_a, member_b)
);
CREATE INDEX idx_conversations_a ON conversations(member_a);
CREATE INDEX idx_conversations_b ON conversations(member_b);

CREATE TABLE messages (
    id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL,
    sender_id TEXT NOT NULL,
    text TEXT NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
);
CREATE INDEX idx_messages_conv_created ON messages(conversation_id, created_at);
",
    )])
}
