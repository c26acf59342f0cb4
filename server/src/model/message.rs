use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An unread message pulled from the mailbox collaborator.
/// Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: String,
    pub thread_id: String,
    pub subject: String,
    pub sender: String,
    /// Display name from the From header, when the sender provided one.
    pub sender_name: Option<String>,
    pub body: String,
    pub received_at: DateTime<Utc>,
}

/// A message from the user's sent listing, used to build the retrieval corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentMessage {
    pub id: String,
    pub thread_id: String,
    pub subject: String,
    pub recipient: String,
    pub date: Option<DateTime<Utc>>,
    /// Raw RFC 2822 body, parsed by the corpus collector.
    pub raw_body: String,
}
