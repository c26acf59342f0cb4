use std::str::FromStr;

use anyhow::Context;
use indoc::{formatdoc, indoc};

use crate::error::ProcessError;
use crate::model::draft::ReplyTopic;
use crate::model::user::ResponseLength;
use crate::prompt::{ChatModel, ChatRequest};

/// Everything the reply generator needs about the message and the user's
/// writing preferences. `context` is the retrieval snippet block, empty when
/// retrieval was skipped or degraded.
#[derive(Debug, Clone)]
pub struct ResponseRequest<'a> {
    pub sender_name: Option<&'a str>,
    pub cleaned_body: &'a str,
    pub length: ResponseLength,
    pub forbidden_words: &'a [String],
    pub writing_style: &'a str,
    pub context: &'a str,
}

#[derive(Debug, Clone)]
pub struct GeneratedReply {
    pub subject: String,
    pub body: String,
    pub topic: ReplyTopic,
}

fn system_prompt() -> String {
    indoc! {r#"
        You write email responses on behalf of the user. Respond with a JSON object with the keys:
        subject (the reply subject line),
        body (the full reply text),
        topic (one of Professional, Personal, Marketing).
        Never invent placeholder names. If the sender's name is unknown, open with "Hi," and do not add a signature.
        Do not provide explanations outside the JSON object."#}
    .to_string()
}

fn user_prompt(request: &ResponseRequest<'_>) -> String {
    let sender_line = match request.sender_name {
        Some(name) => format!("The sender's name is {}.", name),
        None => "The sender's name is unknown.".to_string(),
    };

    let forbidden = if request.forbidden_words.is_empty() {
        String::new()
    } else {
        format!(
            "Never use any of these words: {}.\n",
            request.forbidden_words.join(", ")
        )
    };

    let context = if request.context.is_empty() {
        String::new()
    } else {
        formatdoc! {r#"
            Past replies the user wrote in similar situations, for tone and phrasing:
            <context>{context}</context>
        "#, context = request.context}
    };

    formatdoc! {r#"
        Write a reply to the email between the <email> tags.
        {sender_line}
        Writing style: {style}. Response length: {length}.
        {forbidden}{context}<email>{body}</email>"#,
        sender_line = sender_line,
        style = request.writing_style,
        length = request.length,
        forbidden = forbidden,
        context = context,
        body = request.cleaned_body,
    }
}

pub async fn respond(
    model: &dyn ChatModel,
    request: &ResponseRequest<'_>,
) -> Result<GeneratedReply, ProcessError> {
    let completion = model
        .complete(ChatRequest {
            system: system_prompt(),
            user: user_prompt(request),
        })
        .await
        .map_err(|e| ProcessError::ResponseGeneration(e.to_string()))?;

    parse_reply(&completion.content)
        .map_err(|e| ProcessError::ResponseGeneration(format!("{:#}", e)))
}

/// All three fields are required; a reply without a subject, body or topic
/// is a stage failure, not a draft.
fn parse_reply(content: &str) -> anyhow::Result<GeneratedReply> {
    let value: serde_json::Value =
        serde_json::from_str(content).context("Reply output is not valid JSON")?;

    let subject = value
        .get("subject")
        .and_then(|v| v.as_str())
        .context("No subject in reply output")?
        .to_string();

    let body = value
        .get("body")
        .and_then(|v| v.as_str())
        .context("No body in reply output")?
        .to_string();

    let topic = value
        .get("topic")
        .and_then(|v| v.as_str())
        .context("No topic in reply output")?;
    let topic =
        ReplyTopic::from_str(topic).with_context(|| format!("Unrecognized topic: {}", topic))?;

    Ok(GeneratedReply {
        subject,
        body,
        topic,
    })
}
