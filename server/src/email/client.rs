use async_trait::async_trait;

use crate::error::AppResult;
use crate::model::draft::MailboxDraft;
use crate::model::message::{InboundMessage, SentMessage};

/// Outgoing reply draft, threaded onto the message it answers.
#[derive(Debug, Clone)]
pub struct CreateDraft<'a> {
    pub thread_id: &'a str,
    pub message_id: &'a str,
    pub to: &'a str,
    pub subject: &'a str,
    pub body: &'a str,
}

/// Mailbox operations the triage pipeline needs. One instance per user;
/// implementations own their credential and rate limiting.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Unread inbox messages, oldest first, at most `limit`.
    async fn list_unread(&self, limit: u32) -> AppResult<Vec<InboundMessage>>;

    /// Previously sent messages, most recent first, at most `limit`.
    async fn list_sent(&self, limit: u32) -> AppResult<Vec<SentMessage>>;

    async fn mark_read(&self, message_id: &str) -> AppResult<()>;

    async fn create_draft(&self, draft: CreateDraft<'_>) -> AppResult<MailboxDraft>;
}

/// Hands out a [`Mailbox`] for a given user. The batch runner goes through
/// this so tests can substitute in-memory mailboxes.
#[async_trait]
pub trait MailboxProvider: Send + Sync {
    async fn mailbox_for(
        &self,
        user: &crate::model::user::UserRecord,
    ) -> AppResult<std::sync::Arc<dyn Mailbox>>;
}
