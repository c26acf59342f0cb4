use std::collections::BTreeMap;

use crate::email::cleaned::extract_reply_text;
use crate::email::client::Mailbox;
use crate::error::AppResult;
use crate::retrieval::{CorpusEntry, Embedder, ReplyIndex};
use crate::server_config::RetrievalConfig;
use crate::store::UserStore;

/// Collect the user's past replies as index corpus, in sent order.
pub async fn collect_reply_corpus(
    mailbox: &dyn Mailbox,
    limit: u32,
) -> AppResult<Vec<CorpusEntry>> {
    let sent = mailbox.list_sent(limit).await?;

    Ok(sent
        .iter()
        .map(|msg| {
            let mut metadata = BTreeMap::new();
            metadata.insert("thread_id".to_string(), msg.thread_id.clone());
            metadata.insert("subject".to_string(), msg.subject.clone());
            metadata.insert("recipient".to_string(), msg.recipient.clone());
            if let Some(date) = msg.date {
                metadata.insert("date".to_string(), date.to_rfc3339());
            }

            CorpusEntry {
                text: extract_reply_text(msg),
                metadata,
            }
        })
        .collect())
}

/// Rebuild a user's index from scratch and persist it. The new index is
/// built fully before the store is touched, so readers never see a
/// half-written index.
pub async fn rebuild_user_index(
    embedder: &dyn Embedder,
    mailbox: &dyn Mailbox,
    store: &dyn UserStore,
    user_id: &str,
    cfg: &RetrievalConfig,
) -> AppResult<ReplyIndex> {
    let corpus = collect_reply_corpus(mailbox, cfg.corpus_limit as u32).await?;
    let index = ReplyIndex::build(embedder, corpus, cfg.min_entry_chars).await?;

    store.save_index(user_id, index.to_bytes()?).await?;

    tracing::info!(
        user_id = %user_id,
        entries = index.len(),
        "Rebuilt reply index"
    );

    Ok(index)
}
