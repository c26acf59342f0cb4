use std::sync::Arc;

use futures::{stream, StreamExt};

use crate::email::client::MailboxProvider;
use crate::email::promo::PromotionalFilter;
use crate::model::user::UserRecord;
use crate::observability::{BatchSummary, BatchTracker};
use crate::pipeline::processor::DraftProcessor;
use crate::prompt::ChatModel;
use crate::quota::QuotaLedger;
use crate::retrieval::{corpus, Embedder, ReplyIndex};
use crate::server_config::AppConfig;
use crate::store::UserStore;

/// Drives one batch run across all users. A fixed number of users are in
/// flight at a time, each with its own mailbox and message reports; a
/// failure for one user is logged and never aborts the batch.
pub struct BatchRunner {
    pub cfg: Arc<AppConfig>,
    pub store: Arc<dyn UserStore>,
    pub chat: Arc<dyn ChatModel>,
    pub embedder: Arc<dyn Embedder>,
    pub provider: Arc<dyn MailboxProvider>,
}

impl BatchRunner {
    pub async fn run_batch(&self) -> crate::error::AppResult<BatchSummary> {
        let users = self.store.list_users().await?;
        tracing::info!("Starting batch run over {} users", users.len());

        let tracker = BatchTracker::new();
        let quota = QuotaLedger::new();
        let filter = PromotionalFilter::new(&self.cfg.filter.cue_phrases);

        stream::iter(users)
            .for_each_concurrent(self.cfg.processing.max_concurrent_users, |user| {
                let tracker = &tracker;
                let quota = &quota;
                let filter = &filter;
                async move {
                    if !user.has_mailbox_credential {
                        tracing::debug!(user_id = %user.id, "Skipping user without mailbox credential");
                        tracker.record_user_skipped();
                        return;
                    }

                    match self.process_user(&user, quota, filter, tracker).await {
                        Ok(reports) => {
                            tracker.record_user_processed();
                            tracing::info!(
                                user_id = %user.id,
                                messages = reports.len(),
                                persisted = reports.iter().filter(|r| r.is_persisted()).count(),
                                "Finished user"
                            );
                        }
                        Err(e) => {
                            tracker.record_user_skipped();
                            tracing::error!(user_id = %user.id, "User batch failed: {:?}", e);
                        }
                    }
                }
            })
            .await;

        tracing::info!("Batch run complete\n{}", tracker.status_table());

        Ok(tracker.summary())
    }

    async fn process_user(
        &self,
        user: &UserRecord,
        quota: &QuotaLedger,
        filter: &PromotionalFilter,
        tracker: &BatchTracker,
    ) -> crate::error::AppResult<Vec<crate::pipeline::types::MessageReport>> {
        let mailbox = self.provider.mailbox_for(user).await?;

        let processor = DraftProcessor {
            user,
            cfg: &self.cfg,
            mailbox: mailbox.as_ref(),
            store: self.store.as_ref(),
            chat: self.chat.as_ref(),
            embedder: self.embedder.as_ref(),
            quota,
            filter,
            tracker,
        };

        processor.process_unread().await
    }

    /// Rebuild every credentialed user's reply index. Runs on its own
    /// schedule, much less often than the draft batch; embedding is
    /// rate-limited so users are rebuilt one at a time.
    pub async fn rebuild_all_indexes(&self) -> crate::error::AppResult<usize> {
        let users = self.store.list_users().await?;
        let mut rebuilt = 0;

        for user in users.iter().filter(|u| u.has_mailbox_credential) {
            match self.rebuild_index_for_user(&user.id).await {
                Ok(index) => {
                    rebuilt += 1;
                    tracing::debug!(user_id = %user.id, entries = index.len(), "Index rebuilt");
                }
                Err(e) => {
                    tracing::error!(user_id = %user.id, "Index rebuild failed: {:?}", e);
                }
            }
        }

        Ok(rebuilt)
    }

    /// Rebuild one user's reply index from their sent mail and persist it.
    pub async fn rebuild_index_for_user(&self, user_id: &str) -> crate::error::AppResult<ReplyIndex> {
        let user = self.store.get_user(user_id).await?;
        let mailbox = self.provider.mailbox_for(&user).await?;

        corpus::rebuild_user_index(
            self.embedder.as_ref(),
            mailbox.as_ref(),
            self.store.as_ref(),
            user_id,
            &self.cfg.retrieval,
        )
        .await
    }
}
