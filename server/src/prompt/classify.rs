use std::str::FromStr;

use anyhow::{anyhow, Context};
use indoc::{formatdoc, indoc};

use crate::error::ProcessError;
use crate::model::classification::{Category, Classification, Sentiment};
use crate::model::message::InboundMessage;
use crate::prompt::{ChatModel, ChatRequest};

fn system_prompt() -> String {
    indoc! {r#"
        You are an email classifier. Analyze the email and respond with a JSON object with the keys:
        category (one of Personal, Work, Marketing, Notification, Support, Other),
        subcategory (free text),
        urgency (integer 1-5, 5 is most urgent),
        contains_question (boolean),
        entities (array of strings),
        action_items (array of strings),
        sentiment (one of Positive, Neutral, Negative).
        Do not provide explanations or any keys beyond these."#}
    .to_string()
}

fn user_prompt(message: &InboundMessage, cleaned_body: &str) -> String {
    formatdoc! {r#"
        Classify the following email.
        <subject>{subject}</subject>
        <sender>{sender}</sender>
        <content>{content}</content>"#,
        subject = message.subject,
        sender = message.sender,
        content = cleaned_body,
    }
}

pub async fn classify(
    model: &dyn ChatModel,
    message: &InboundMessage,
    cleaned_body: &str,
) -> Result<Classification, ProcessError> {
    let completion = model
        .complete(ChatRequest {
            system: system_prompt(),
            user: user_prompt(message, cleaned_body),
        })
        .await
        .map_err(|e| ProcessError::Classification(e.to_string()))?;

    parse_classification(&completion.content)
        .map_err(|e| ProcessError::Classification(format!("{:#}", e)))
}

/// Validate the model output. Category, urgency, contains_question and
/// sentiment are required; the rest default when absent. An unrecognized
/// category or sentiment string falls back to the catch-all variant rather
/// than failing the stage.
fn parse_classification(content: &str) -> anyhow::Result<Classification> {
    let value: serde_json::Value =
        serde_json::from_str(content).context("Classification output is not valid JSON")?;

    let category = value
        .get("category")
        .and_then(|v| v.as_str())
        .context("No category in classification output")?;
    let category = Category::from_str(category).unwrap_or(Category::Other);

    let urgency = value
        .get("urgency")
        .and_then(|v| v.as_i64())
        .context("No urgency in classification output")?;
    if !(1..=5).contains(&urgency) {
        return Err(anyhow!("Urgency {} out of range 1-5", urgency));
    }

    let contains_question = value
        .get("contains_question")
        .and_then(|v| v.as_bool())
        .context("No contains_question in classification output")?;

    let sentiment = value
        .get("sentiment")
        .and_then(|v| v.as_str())
        .context("No sentiment in classification output")?;
    let sentiment = Sentiment::from_str(sentiment).unwrap_or(Sentiment::Neutral);

    let subcategory = value
        .get("subcategory")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let string_list = |key: &str| -> Vec<String> {
        value
            .get(key)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|i| i.as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default()
    };

    Ok(Classification {
        category,
        subcategory,
        urgency: urgency as u8,
        contains_question,
        entities: string_list("entities"),
        action_items: string_list("action_items"),
        sentiment,
    })
}
