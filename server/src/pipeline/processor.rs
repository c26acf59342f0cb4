use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use futures::{stream, StreamExt};

use crate::email::cleaned::clean_email_body;
use crate::email::client::{CreateDraft, Mailbox};
use crate::email::promo::PromotionalFilter;
use crate::error::ProcessError;
use crate::model::draft::DraftRecord;
use crate::model::message::InboundMessage;
use crate::observability::BatchTracker;
use crate::pipeline::stages;
use crate::pipeline::types::{DiscardReason, MessageOutcome, MessageReport};
use crate::prompt::respond::ResponseRequest;
use crate::prompt::ChatModel;
use crate::quota::QuotaLedger;
use crate::retrieval::{Embedder, ReplyIndex};
use crate::server_config::AppConfig;
use crate::store::UserStore;

/// Runs the triage pipeline over one user's unread messages. Messages run
/// concurrently but independently; one message's failure never touches its
/// siblings.
pub struct DraftProcessor<'a> {
    pub user: &'a crate::model::user::UserRecord,
    pub cfg: &'a AppConfig,
    pub mailbox: &'a dyn Mailbox,
    pub store: &'a dyn UserStore,
    pub chat: &'a dyn ChatModel,
    pub embedder: &'a dyn Embedder,
    pub quota: &'a QuotaLedger,
    pub filter: &'a PromotionalFilter,
    pub tracker: &'a BatchTracker,
}

impl DraftProcessor<'_> {
    /// One batch pass for this user: fetch unread, run each message through
    /// the pipeline, then write the remaining quota back to the store.
    pub async fn process_unread(&self) -> crate::error::AppResult<Vec<MessageReport>> {
        let messages = self
            .mailbox
            .list_unread(self.cfg.processing.unread_batch_limit as u32)
            .await?;

        if messages.is_empty() {
            return Ok(Vec::new());
        }

        self.quota.seed(
            &self.user.id,
            self.user.remaining_drafts,
            self.user.unlimited_drafts,
        );

        let index = self.load_index().await;
        let index = index.as_ref();

        let reports = Mutex::new(Vec::with_capacity(messages.len()));
        stream::iter(&messages)
            .for_each_concurrent(self.cfg.processing.max_concurrent_messages, |message| {
                let reports = &reports;
                async move {
                    let report = self.run_message_pipeline(message, index).await;
                    self.settle_read_state(message, &report).await;
                    reports.lock().unwrap_or_else(|e| e.into_inner()).push(report);
                }
            })
            .await;

        if let Some(remaining) = self.quota.remaining(&self.user.id) {
            if let Err(e) = self.store.update_quota(&self.user.id, remaining).await {
                tracing::error!(
                    user_id = %self.user.id,
                    "Failed to write back draft quota: {:?}",
                    e
                );
            }
        }

        Ok(reports.into_inner().unwrap_or_else(|e| e.into_inner()))
    }

    /// The stored index, or None when the user has none or it cannot be
    /// read. Either way the pipeline proceeds without context.
    async fn load_index(&self) -> Option<ReplyIndex> {
        let bytes = match self.store.load_index(&self.user.id).await {
            Ok(bytes) => bytes?,
            Err(e) => {
                tracing::warn!(user_id = %self.user.id, "Could not load reply index: {:?}", e);
                return None;
            }
        };

        match ReplyIndex::from_bytes(&bytes) {
            Ok(index) => Some(index),
            Err(e) => {
                tracing::warn!(user_id = %self.user.id, "Stored reply index is unreadable: {:?}", e);
                None
            }
        }
    }

    async fn run_message_pipeline(
        &self,
        message: &InboundMessage,
        index: Option<&ReplyIndex>,
    ) -> MessageReport {
        let timeout = Duration::from_secs(self.cfg.processing.stage_timeout_secs);
        let cleaned = clean_email_body(&message.body);

        // Promotional mail is settled here, before any model call.
        if self.filter.is_promotional(&message.subject, &cleaned) {
            self.tracker.record_promotional();
            return self.report(message, None, None, discarded(DiscardReason::Promotional));
        }

        let classification = match stages::classify_stage(self.chat, message, &cleaned, timeout).await
        {
            Ok(classification) => classification,
            Err(e) => return self.stage_failed(message, None, None, e),
        };

        let priority = match stages::prioritize_stage(self.chat, &classification, timeout).await {
            Ok(priority) => priority,
            Err(e) => return self.stage_failed(message, Some(classification), None, e),
        };

        if priority.needs_no_reply() {
            self.tracker.record_no_reply_needed();
            return self.report(
                message,
                Some(classification),
                Some(priority),
                discarded(DiscardReason::NoReplyNeeded),
            );
        }

        let (context, degraded) =
            stages::retrieve_stage(index, self.embedder, &cleaned, &self.cfg.retrieval, timeout)
                .await;
        if degraded {
            self.tracker.record_retrieval_degraded();
        }

        let prefs = &self.user.preferences;
        let request = ResponseRequest {
            sender_name: message.sender_name.as_deref(),
            cleaned_body: &cleaned,
            length: prefs.response_length,
            forbidden_words: &prefs.forbidden_words,
            writing_style: &prefs.writing_style,
            context: &context,
        };
        let reply = match stages::respond_stage(self.chat, &request, timeout).await {
            Ok(reply) => reply,
            Err(e) => return self.stage_failed(message, Some(classification), Some(priority), e),
        };

        // Charge after generation, persist only after the charge succeeds.
        if !self.quota.charge_draft(&self.user.id) {
            self.tracker.record_quota_denied();
            tracing::info!(
                user_id = %self.user.id,
                message_id = %message.id,
                "Draft quota exhausted, discarding generated reply"
            );
            return self.report(
                message,
                Some(classification),
                Some(priority),
                discarded(DiscardReason::QuotaDenied),
            );
        }

        let mailbox_draft = match self
            .mailbox
            .create_draft(CreateDraft {
                thread_id: &message.thread_id,
                message_id: &message.id,
                to: &message.sender,
                subject: &reply.subject,
                body: &reply.body,
            })
            .await
        {
            Ok(draft) => draft,
            Err(e) => {
                // Return the charge: no draft record exists, and the unread
                // message will be charged again on retry.
                self.quota.refund_draft(&self.user.id);
                tracing::error!(
                    user_id = %self.user.id,
                    message_id = %message.id,
                    "Draft not created in mailbox, charge refunded: {:?}",
                    e
                );
                return self.stage_failed(
                    message,
                    Some(classification),
                    Some(priority),
                    ProcessError::Persistence(e.to_string()),
                );
            }
        };

        let record = DraftRecord {
            id: String::new(),
            user_id: self.user.id.clone(),
            thread_id: message.thread_id.clone(),
            source_message_id: message.id.clone(),
            recipient_email: message.sender.clone(),
            sender_email: self.user.email.clone(),
            original_subject: message.subject.clone(),
            original_body: message.body.clone(),
            draft_subject: reply.subject.clone(),
            draft_body: reply.body.clone(),
            topic: reply.topic,
            action_item: classification.action_items.first().cloned(),
            priority: priority.level,
            draft_provider_ref: mailbox_draft.draft_id.clone(),
            draft_link: mailbox_draft.draft_link.clone(),
            created_at: Utc::now(),
            modified_at: Utc::now(),
        };

        let draft_id = match self.store.save_draft(record).await {
            Ok(id) => id,
            Err(e) => {
                self.quota.refund_draft(&self.user.id);
                tracing::error!(
                    user_id = %self.user.id,
                    message_id = %message.id,
                    "Draft created in mailbox but not recorded, charge refunded: {:?}",
                    e
                );
                return self.stage_failed(
                    message,
                    Some(classification),
                    Some(priority),
                    ProcessError::Persistence(e.to_string()),
                );
            }
        };

        self.tracker.record_persisted();
        self.report(
            message,
            Some(classification),
            Some(priority),
            MessageOutcome::Persisted { draft_id },
        )
    }

    fn stage_failed(
        &self,
        message: &InboundMessage,
        classification: Option<crate::model::classification::Classification>,
        priority: Option<crate::model::priority::PriorityAssessment>,
        error: ProcessError,
    ) -> MessageReport {
        self.tracker.record_stage_failure();
        tracing::warn!(
            user_id = %self.user.id,
            message_id = %message.id,
            stage = error.stage(),
            "Message pipeline failed: {}",
            error
        );
        self.report(
            message,
            classification,
            priority,
            discarded(DiscardReason::StageFailed(error)),
        )
    }

    /// Persisted drafts and definitive discards are marked read. Stage
    /// failures leave the message unread so the next run retries it.
    async fn settle_read_state(&self, message: &InboundMessage, report: &MessageReport) {
        let settled = match &report.outcome {
            MessageOutcome::Persisted { .. } => true,
            MessageOutcome::Discarded { reason } => reason.is_definitive(),
        };
        if settled {
            self.mark_read(message).await;
        }
    }

    /// Mark-read failures are logged but do not change the outcome; the
    /// worst case is a reconsidered message next run.
    async fn mark_read(&self, message: &InboundMessage) {
        if let Err(e) = self.mailbox.mark_read(&message.id).await {
            tracing::warn!(message_id = %message.id, "Could not mark message read: {:?}", e);
        }
    }

    fn report(
        &self,
        message: &InboundMessage,
        classification: Option<crate::model::classification::Classification>,
        priority: Option<crate::model::priority::PriorityAssessment>,
        outcome: MessageOutcome,
    ) -> MessageReport {
        MessageReport {
            message_id: message.id.clone(),
            classification,
            priority,
            outcome,
        }
    }
}

fn discarded(reason: DiscardReason) -> MessageOutcome {
    MessageOutcome::Discarded { reason }
}
