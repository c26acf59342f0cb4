use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use chrono::{DateTime, Utc};
use leaky_bucket::RateLimiter;
use serde::Deserialize;
use serde_json::json;

use crate::email::client::{CreateDraft, Mailbox, MailboxProvider};
use crate::error::{AppError, AppResult};
use crate::model::draft::MailboxDraft;
use crate::model::message::{InboundMessage, SentMessage};
use crate::model::user::UserRecord;
use crate::HttpClient;

macro_rules! gmail_url {
    ($($params:expr),*) => {
        {
            const GMAIL_ENDPOINT: &str = "https://gmail.googleapis.com/gmail/v1/users/me";
            let list_params = vec![$($params),*];
            let path = list_params.join("/");
            format!("{}/{}", GMAIL_ENDPOINT, path)
        }
    };
}

// Gmail API quota units per call
const QUOTA_PER_SECOND: usize = 250;
const QUOTA_MESSAGES_LIST: usize = 5;
const QUOTA_MESSAGES_GET: usize = 5;
const QUOTA_MESSAGES_MODIFY: usize = 5;
const QUOTA_DRAFTS_CREATE: usize = 10;

#[derive(Debug, Deserialize)]
struct ListMessagesResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    id: String,
    thread_id: String,
    raw: String,
    #[serde(default)]
    internal_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DraftResponse {
    id: String,
}

/// Gmail mailbox bound to one user's access token.
pub struct GmailMailbox {
    http_client: HttpClient,
    access_token: String,
    rate_limiter: Arc<RateLimiter>,
}

impl GmailMailbox {
    pub fn new(http_client: HttpClient, access_token: String) -> Self {
        let rate_limiter = Arc::new(
            RateLimiter::builder()
                .initial(QUOTA_PER_SECOND)
                .interval(Duration::from_secs(1))
                .refill(QUOTA_PER_SECOND)
                .build(),
        );

        Self {
            http_client,
            access_token,
            rate_limiter,
        }
    }

    async fn list_message_ids(&self, query: &str, limit: u32) -> AppResult<Vec<String>> {
        self.rate_limiter.acquire(QUOTA_MESSAGES_LIST).await;

        let resp = self
            .http_client
            .get(gmail_url!("messages"))
            .bearer_auth(&self.access_token)
            .query(&[("q", query), ("maxResults", &limit.to_string())])
            .send()
            .await?;

        if !resp.status().is_success() {
            let json = resp.json::<serde_json::Value>().await?;
            return Err(anyhow!("Error listing messages: {:?}", json).into());
        }

        let data = resp.json::<ListMessagesResponse>().await?;

        Ok(data.messages.into_iter().map(|m| m.id).collect())
    }

    async fn get_raw_message(&self, message_id: &str) -> AppResult<RawMessage> {
        self.rate_limiter.acquire(QUOTA_MESSAGES_GET).await;

        let resp = self
            .http_client
            .get(gmail_url!("messages", message_id))
            .bearer_auth(&self.access_token)
            .query(&[("format", "raw")])
            .send()
            .await?;

        if !resp.status().is_success() {
            let json = resp.json::<serde_json::Value>().await?;
            return Err(anyhow!("Error getting message {}: {:?}", message_id, json).into());
        }

        Ok(resp.json::<RawMessage>().await?)
    }

    fn decode_mime(raw: &RawMessage) -> AppResult<(String, DateTime<Utc>)> {
        let bytes = URL_SAFE
            .decode(&raw.raw)
            .context("Invalid base64url message body")?;
        let mime = String::from_utf8_lossy(&bytes).to_string();

        let received_at = raw
            .internal_date
            .as_deref()
            .and_then(|ms| ms.parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_else(Utc::now);

        Ok((mime, received_at))
    }
}

#[async_trait]
impl Mailbox for GmailMailbox {
    async fn list_unread(&self, limit: u32) -> AppResult<Vec<InboundMessage>> {
        let ids = self.list_message_ids("is:unread in:inbox", limit).await?;

        let mut messages = Vec::with_capacity(ids.len());
        for id in ids {
            let raw = self.get_raw_message(&id).await?;
            let (mime, received_at) = Self::decode_mime(&raw)?;

            let parsed = mail_parser::MessageParser::default()
                .parse(mime.as_bytes())
                .with_context(|| format!("Failed to parse MIME message {}", raw.id))?;

            let from = parsed.from().and_then(|f| f.first());
            let sender = from
                .and_then(|a| a.address())
                .unwrap_or_default()
                .to_string();
            let sender_name = from.and_then(|a| a.name()).map(|n| n.to_string());

            messages.push(InboundMessage {
                id: raw.id,
                thread_id: raw.thread_id,
                subject: parsed.subject().unwrap_or_default().to_string(),
                sender,
                sender_name,
                body: parsed.body_text(0).unwrap_or_default().to_string(),
                received_at,
            });
        }

        // Gmail lists newest first; the pipeline wants oldest first.
        messages.reverse();

        Ok(messages)
    }

    async fn list_sent(&self, limit: u32) -> AppResult<Vec<SentMessage>> {
        let ids = self.list_message_ids("in:sent", limit).await?;

        let mut messages = Vec::with_capacity(ids.len());
        for id in ids {
            let raw = self.get_raw_message(&id).await?;
            let (mime, _) = Self::decode_mime(&raw)?;

            let parsed = mail_parser::MessageParser::default()
                .parse(mime.as_bytes())
                .with_context(|| format!("Failed to parse MIME message {}", raw.id))?;

            let recipient = parsed
                .to()
                .and_then(|t| t.first())
                .and_then(|a| a.address())
                .unwrap_or_default()
                .to_string();

            messages.push(SentMessage {
                id: raw.id,
                thread_id: raw.thread_id,
                subject: parsed.subject().unwrap_or_default().to_string(),
                recipient,
                date: parsed.date().map(|d| {
                    DateTime::from_timestamp(d.to_timestamp(), 0).unwrap_or_else(Utc::now)
                }),
                raw_body: mime,
            });
        }

        Ok(messages)
    }

    async fn mark_read(&self, message_id: &str) -> AppResult<()> {
        self.rate_limiter.acquire(QUOTA_MESSAGES_MODIFY).await;

        let resp = self
            .http_client
            .post(gmail_url!("messages", message_id, "modify"))
            .bearer_auth(&self.access_token)
            .json(&json!({
                "removeLabelIds": ["UNREAD"],
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let json = resp.json::<serde_json::Value>().await?;
            return Err(anyhow!("Error marking message {} read: {:?}", message_id, json).into());
        }

        Ok(())
    }

    async fn create_draft(&self, draft: CreateDraft<'_>) -> AppResult<MailboxDraft> {
        self.rate_limiter.acquire(QUOTA_DRAFTS_CREATE).await;

        let mime = build_rfc2822(&draft);
        let resp = self
            .http_client
            .post(gmail_url!("drafts"))
            .bearer_auth(&self.access_token)
            .json(&json!({
                "message": {
                    "threadId": draft.thread_id,
                    "raw": URL_SAFE.encode(mime.as_bytes()),
                },
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let json = resp.json::<serde_json::Value>().await?;
            return Err(anyhow!("Error creating draft: {:?}", json).into());
        }

        let data = resp.json::<DraftResponse>().await?;
        let draft_link = draft_link(&data.id);

        Ok(MailboxDraft {
            draft_id: data.id,
            draft_link,
        })
    }
}

/// Assemble the RFC 2822 reply, threaded onto the original via
/// In-Reply-To/References.
fn build_rfc2822(draft: &CreateDraft<'_>) -> String {
    format!(
        "To: {to}\r\nSubject: {subject}\r\nIn-Reply-To: <{id}>\r\nReferences: <{id}>\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{body}",
        to = draft.to,
        subject = draft.subject,
        id = draft.message_id,
        body = draft.body,
    )
}

fn draft_link(draft_id: &str) -> String {
    format!("https://mail.google.com/mail/u/0/#drafts?compose={}", draft_id)
}

/// Builds one [`GmailMailbox`] per user from the user's stored access token.
pub struct GmailMailboxProvider {
    http_client: HttpClient,
}

impl GmailMailboxProvider {
    pub fn new(http_client: HttpClient) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl MailboxProvider for GmailMailboxProvider {
    async fn mailbox_for(&self, user: &UserRecord) -> AppResult<Arc<dyn Mailbox>> {
        let token = user
            .access_token
            .clone()
            .ok_or_else(|| AppError::BadRequest("User has no mailbox credential".to_string()))?;

        Ok(Arc::new(GmailMailbox::new(self.http_client.clone(), token)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_rfc2822_threads_reply() {
        let mime = build_rfc2822(&CreateDraft {
            thread_id: "t1",
            message_id: "abc123",
            to: "alice@example.com",
            subject: "Re: Standup",
            body: "Works for me.",
        });

        assert!(mime.starts_with("To: alice@example.com\r\n"));
        assert!(mime.contains("Subject: Re: Standup\r\n"));
        assert!(mime.contains("In-Reply-To: <abc123>\r\n"));
        assert!(mime.contains("References: <abc123>\r\n"));
        assert!(mime.ends_with("\r\n\r\nWorks for me."));
    }

    #[test]
    fn test_draft_link_format() {
        assert_eq!(
            draft_link("r555"),
            "https://mail.google.com/mail/u/0/#drafts?compose=r555"
        );
    }
}
