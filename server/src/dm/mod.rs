//! Conversation and message archive.
//!
//! Plain CRUD over SQLite. The relay core never calls into this module;
//! clients persist a message here alongside sending it over `/ws`.

pub mod conversations;
pub mod messages;

use chrono::{SecondsFormat, Utc};

/// Timestamp format used for archive rows: RFC 3339 UTC with millisecond
/// precision, so lexical order matches chronological order.
pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
