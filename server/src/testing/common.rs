//! Shared test doubles for the pipeline's collaborators.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;

use crate::email::client::{CreateDraft, Mailbox, MailboxProvider};
use crate::error::{AppError, AppResult};
use crate::model::draft::{DraftRecord, MailboxDraft};
use crate::model::message::{InboundMessage, SentMessage};
use crate::model::user::UserRecord;
use crate::prompt::{ChatCompletion, ChatModel, ChatRequest};
use crate::retrieval::Embedder;
use crate::store::{MemoryUserStore, UserStore};

/// Scripted chat model. Requests are routed to a stage by the opening of
/// their system prompt, so one double serves classification, prioritization
/// and response generation in the same test.
pub struct ScriptedChatModel {
    classify_response: Mutex<String>,
    prioritize_response: Mutex<String>,
    respond_response: Mutex<String>,
    pub classify_calls: AtomicUsize,
    pub prioritize_calls: AtomicUsize,
    pub respond_calls: AtomicUsize,
    /// Message ids whose classification call should return malformed JSON.
    malformed_for: Mutex<HashSet<String>>,
}

impl ScriptedChatModel {
    pub fn new() -> Self {
        Self {
            classify_response: Mutex::new(
                r#"{"category": "Work", "subcategory": "General", "urgency": 3, "contains_question": true, "entities": [], "action_items": ["Reply"], "sentiment": "Neutral"}"#
                    .to_string(),
            ),
            prioritize_response: Mutex::new(
                r#"{"priority_level": "High", "response_timeframe": "Today", "reasoning": "Direct question."}"#
                    .to_string(),
            ),
            respond_response: Mutex::new(
                r#"{"subject": "Re: Hello", "body": "Hi,\n\nSounds good.", "topic": "Professional"}"#
                    .to_string(),
            ),
            classify_calls: AtomicUsize::new(0),
            prioritize_calls: AtomicUsize::new(0),
            respond_calls: AtomicUsize::new(0),
            malformed_for: Mutex::new(HashSet::new()),
        }
    }

    pub fn set_prioritize_response(&self, content: &str) {
        *self.prioritize_response.lock().unwrap() = content.to_string();
    }

    pub fn set_respond_response(&self, content: &str) {
        *self.respond_response.lock().unwrap() = content.to_string();
    }

    /// Make the classification call fail for any message whose prompt
    /// contains `marker` (typically the subject).
    pub fn malform_classification_containing(&self, marker: &str) {
        self.malformed_for.lock().unwrap().insert(marker.to_string());
    }

    pub fn total_calls(&self) -> usize {
        self.classify_calls.load(Relaxed)
            + self.prioritize_calls.load(Relaxed)
            + self.respond_calls.load(Relaxed)
    }
}

impl Default for ScriptedChatModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn complete(&self, request: ChatRequest) -> AppResult<ChatCompletion> {
        let content = if request.system.starts_with("You are an email classifier") {
            self.classify_calls.fetch_add(1, Relaxed);
            let malformed = self
                .malformed_for
                .lock()
                .unwrap()
                .iter()
                .any(|marker| request.user.contains(marker.as_str()));
            if malformed {
                "{ not valid json".to_string()
            } else {
                self.classify_response.lock().unwrap().clone()
            }
        } else if request.system.starts_with("You are an email prioritizer") {
            self.prioritize_calls.fetch_add(1, Relaxed);
            self.prioritize_response.lock().unwrap().clone()
        } else {
            self.respond_calls.fetch_add(1, Relaxed);
            self.respond_response.lock().unwrap().clone()
        };

        Ok(ChatCompletion {
            content,
            total_tokens: 100,
        })
    }
}

/// Deterministic embedder: a normalized letter histogram. Similar texts get
/// similar vectors, no network involved.
pub struct FakeEmbedder {
    pub fail: std::sync::atomic::AtomicBool,
    pub calls: AtomicUsize,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self {
            fail: std::sync::atomic::AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        let embedder = Self::new();
        embedder.fail.store(true, Relaxed);
        embedder
    }
}

impl Default for FakeEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        self.calls.fetch_add(1, Relaxed);
        if self.fail.load(Relaxed) {
            return Err(AppError::RequestTimeout);
        }

        let mut histogram = [0f32; 26];
        for c in text.to_lowercase().chars() {
            if c.is_ascii_lowercase() {
                histogram[(c as u8 - b'a') as usize] += 1.0;
            }
        }
        let norm = histogram.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in histogram.iter_mut() {
                *x /= norm;
            }
        }

        Ok(histogram.to_vec())
    }
}

/// In-memory mailbox: unread messages in arrival order, plus records of
/// every mark-read and created draft.
#[derive(Default)]
pub struct MemoryMailbox {
    unread: Mutex<Vec<InboundMessage>>,
    sent: Mutex<Vec<SentMessage>>,
    read_ids: Mutex<Vec<String>>,
    drafts: Mutex<Vec<(String, String, String)>>,
    next_draft_id: AtomicUsize,
    pub fail_create_draft: std::sync::atomic::AtomicBool,
}

impl MemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_unread(&self, message: InboundMessage) {
        self.unread.lock().unwrap().push(message);
    }

    pub fn push_sent(&self, message: SentMessage) {
        self.sent.lock().unwrap().push(message);
    }

    pub fn read_ids(&self) -> Vec<String> {
        self.read_ids.lock().unwrap().clone()
    }

    /// Drafts created so far, as (thread_id, subject, body).
    pub fn created_drafts(&self) -> Vec<(String, String, String)> {
        self.drafts.lock().unwrap().clone()
    }
}

pub fn inbound(id: &str, subject: &str, body: &str) -> InboundMessage {
    InboundMessage {
        id: id.to_string(),
        thread_id: format!("thread-{}", id),
        subject: subject.to_string(),
        sender: "alice@example.com".to_string(),
        sender_name: Some("Alice".to_string()),
        body: body.to_string(),
        received_at: Utc::now(),
    }
}

#[async_trait]
impl Mailbox for MemoryMailbox {
    async fn list_unread(&self, limit: u32) -> AppResult<Vec<InboundMessage>> {
        let unread = self.unread.lock().unwrap();
        Ok(unread.iter().take(limit as usize).cloned().collect())
    }

    async fn list_sent(&self, limit: u32) -> AppResult<Vec<SentMessage>> {
        let sent = self.sent.lock().unwrap();
        Ok(sent.iter().take(limit as usize).cloned().collect())
    }

    async fn mark_read(&self, message_id: &str) -> AppResult<()> {
        self.read_ids.lock().unwrap().push(message_id.to_string());
        Ok(())
    }

    async fn create_draft(&self, draft: CreateDraft<'_>) -> AppResult<MailboxDraft> {
        if self.fail_create_draft.load(Relaxed) {
            return Err(anyhow!("draft endpoint unavailable").into());
        }

        self.drafts.lock().unwrap().push((
            draft.thread_id.to_string(),
            draft.subject.to_string(),
            draft.body.to_string(),
        ));
        let n = self.next_draft_id.fetch_add(1, Relaxed) + 1;

        Ok(MailboxDraft {
            draft_id: format!("mbx-draft-{}", n),
            draft_link: format!("https://mail.example.com/drafts/{}", n),
        })
    }
}

/// [`MemoryUserStore`] wrapper whose `save_draft` can be made to fail while
/// every other operation stays intact.
#[derive(Default)]
pub struct UnreliableStore {
    pub inner: MemoryUserStore,
    pub fail_save_draft: std::sync::atomic::AtomicBool,
}

#[async_trait]
impl UserStore for UnreliableStore {
    async fn list_users(&self) -> AppResult<Vec<UserRecord>> {
        self.inner.list_users().await
    }

    async fn get_user(&self, user_id: &str) -> AppResult<UserRecord> {
        self.inner.get_user(user_id).await
    }

    async fn save_draft(&self, draft: DraftRecord) -> AppResult<String> {
        if self.fail_save_draft.load(Relaxed) {
            return Err(anyhow!("draft table unavailable").into());
        }
        self.inner.save_draft(draft).await
    }

    async fn update_quota(&self, user_id: &str, remaining_drafts: i64) -> AppResult<()> {
        self.inner.update_quota(user_id, remaining_drafts).await
    }

    async fn load_index(&self, user_id: &str) -> AppResult<Option<Vec<u8>>> {
        self.inner.load_index(user_id).await
    }

    async fn save_index(&self, user_id: &str, bytes: Vec<u8>) -> AppResult<()> {
        self.inner.save_index(user_id, bytes).await
    }
}

/// Provider backed by a fixed map of user id to mailbox.
#[derive(Default)]
pub struct MemoryMailboxProvider {
    mailboxes: Mutex<HashMap<String, Arc<MemoryMailbox>>>,
}

impl MemoryMailboxProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: &str, mailbox: Arc<MemoryMailbox>) {
        self.mailboxes
            .lock()
            .unwrap()
            .insert(user_id.to_string(), mailbox);
    }
}

#[async_trait]
impl MailboxProvider for MemoryMailboxProvider {
    async fn mailbox_for(&self, user: &UserRecord) -> AppResult<Arc<dyn Mailbox>> {
        let mailboxes = self.mailboxes.lock().unwrap();
        mailboxes
            .get(&user.id)
            .map(|m| Arc::clone(m) as Arc<dyn Mailbox>)
            .ok_or_else(|| AppError::NotFound(format!("No mailbox for user {}", user.id)))
    }
}
