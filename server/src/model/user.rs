use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
pub enum ResponseLength {
    Short,
    Medium,
    Long,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreferences {
    pub writing_style: String,
    pub response_length: ResponseLength,
    /// Words the generator must never use.
    pub forbidden_words: Vec<String>,
}

impl Default for UserPreferences {
    fn default() -> Self {
        UserPreferences {
            writing_style: "Professional".to_string(),
            response_length: ResponseLength::Short,
            forbidden_words: Vec::new(),
        }
    }
}

/// User record as the store collaborator hands it to the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    /// False when the user never connected a mailbox or revoked access.
    pub has_mailbox_credential: bool,
    pub access_token: Option<String>,
    pub remaining_drafts: i64,
    pub unlimited_drafts: bool,
    pub preferences: UserPreferences,
}

impl UserRecord {
    #[cfg(test)]
    pub fn test_user(id: &str, remaining_drafts: i64) -> Self {
        UserRecord {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            full_name: Some("Test User".to_string()),
            has_mailbox_credential: true,
            access_token: Some("token".to_string()),
            remaining_drafts,
            unlimited_drafts: false,
            preferences: UserPreferences::default(),
        }
    }
}
