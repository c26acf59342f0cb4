use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{AppError, AppResult};
use crate::model::draft::DraftRecord;
use crate::model::user::UserRecord;

/// Persistence boundary for users, saved drafts and serialized reply
/// indexes.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn list_users(&self) -> AppResult<Vec<UserRecord>>;

    async fn get_user(&self, user_id: &str) -> AppResult<UserRecord>;

    /// Persist a draft record, returning its assigned id.
    async fn save_draft(&self, draft: DraftRecord) -> AppResult<String>;

    /// Write back the remaining draft count after a batch run.
    async fn update_quota(&self, user_id: &str, remaining_drafts: i64) -> AppResult<()>;

    async fn load_index(&self, user_id: &str) -> AppResult<Option<Vec<u8>>>;

    async fn save_index(&self, user_id: &str, bytes: Vec<u8>) -> AppResult<()>;
}

#[derive(Default)]
struct MemoryStoreInner {
    users: HashMap<String, UserRecord>,
    drafts: Vec<DraftRecord>,
    indexes: HashMap<String, Vec<u8>>,
    next_draft_id: u64,
}

/// In-memory [`UserStore`]. The production deployment swaps in a database
/// implementation behind the same trait; everything above the trait is
/// unaware of the difference.
#[derive(Default)]
pub struct MemoryUserStore {
    inner: RwLock<MemoryStoreInner>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: UserRecord) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.users.insert(user.id.clone(), user);
    }

    /// Snapshot of saved drafts, in save order.
    pub fn drafts(&self) -> Vec<DraftRecord> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.drafts.clone()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn list_users(&self) -> AppResult<Vec<UserRecord>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut users: Vec<UserRecord> = inner.users.values().cloned().collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }

    async fn get_user(&self, user_id: &str) -> AppResult<UserRecord> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("No user with id {}", user_id)))
    }

    async fn save_draft(&self, mut draft: DraftRecord) -> AppResult<String> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.next_draft_id += 1;
        let id = format!("draft-{}", inner.next_draft_id);
        draft.id = id.clone();
        draft.modified_at = Utc::now();
        inner.drafts.push(draft);
        Ok(id)
    }

    async fn update_quota(&self, user_id: &str, remaining_drafts: i64) -> AppResult<()> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let user = inner
            .users
            .get_mut(user_id)
            .ok_or_else(|| AppError::NotFound(format!("No user with id {}", user_id)))?;
        user.remaining_drafts = remaining_drafts;
        Ok(())
    }

    async fn load_index(&self, user_id: &str) -> AppResult<Option<Vec<u8>>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Ok(inner.indexes.get(user_id).cloned())
    }

    async fn save_index(&self, user_id: &str, bytes: Vec<u8>) -> AppResult<()> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.indexes.insert(user_id.to_string(), bytes);
        Ok(())
    }
}
