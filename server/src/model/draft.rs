use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::priority::PriorityLevel;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
pub enum ReplyTopic {
    Professional,
    Personal,
    Marketing,
}

/// Handle returned by the mailbox collaborator after creating a draft.
#[derive(Debug, Clone)]
pub struct MailboxDraft {
    pub draft_id: String,
    pub draft_link: String,
}

/// A generated, unsent reply. Persisted exactly once per accepted draft,
/// after the quota charge succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftRecord {
    /// Assigned by the store on save.
    pub id: String,
    pub user_id: String,
    pub thread_id: String,
    pub source_message_id: String,
    pub recipient_email: String,
    pub sender_email: String,
    pub original_subject: String,
    pub original_body: String,
    pub draft_subject: String,
    pub draft_body: String,
    pub topic: ReplyTopic,
    pub action_item: Option<String>,
    pub priority: PriorityLevel,
    /// The mailbox collaborator's own draft id.
    pub draft_provider_ref: String,
    pub draft_link: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}
