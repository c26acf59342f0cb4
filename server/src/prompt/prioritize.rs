use std::str::FromStr;

use anyhow::Context;
use indoc::{formatdoc, indoc};

use crate::error::ProcessError;
use crate::model::classification::Classification;
use crate::model::priority::{PriorityAssessment, PriorityLevel, ResponseTimeframe};
use crate::prompt::{ChatModel, ChatRequest};

fn system_prompt() -> String {
    indoc! {r#"
        You are an email prioritizer. Given the structured classification of an email, respond with a JSON object with the keys:
        priority_level (one of Critical, High, Medium, Low, Ignore),
        response_timeframe (one of Immediate, Today, This Week, When Convenient, No Response Needed),
        reasoning (one short sentence).
        Do not provide explanations outside the JSON object."#}
    .to_string()
}

fn user_prompt(classification: &Classification) -> String {
    formatdoc! {r#"
        Assign a priority to the email with this classification:
        category: {category}
        urgency: {urgency}
        contains_question: {contains_question}
        action_items: [{action_items}]"#,
        category = classification.category,
        urgency = classification.urgency,
        contains_question = classification.contains_question,
        action_items = classification.action_items.join(", "),
    }
}

pub async fn prioritize(
    model: &dyn ChatModel,
    classification: &Classification,
) -> Result<PriorityAssessment, ProcessError> {
    let completion = model
        .complete(ChatRequest {
            system: system_prompt(),
            user: user_prompt(classification),
        })
        .await
        .map_err(|e| ProcessError::Prioritization(e.to_string()))?;

    parse_priority(&completion.content)
        .map_err(|e| ProcessError::Prioritization(format!("{:#}", e)))
}

/// Both enum fields are required and must parse; reasoning defaults to
/// the empty string.
fn parse_priority(content: &str) -> anyhow::Result<PriorityAssessment> {
    let value: serde_json::Value =
        serde_json::from_str(content).context("Priority output is not valid JSON")?;

    let level = value
        .get("priority_level")
        .and_then(|v| v.as_str())
        .context("No priority_level in priority output")?;
    let level = PriorityLevel::from_str(level)
        .with_context(|| format!("Unrecognized priority_level: {}", level))?;

    let timeframe = value
        .get("response_timeframe")
        .and_then(|v| v.as_str())
        .context("No response_timeframe in priority output")?;
    let response_timeframe = ResponseTimeframe::from_str(timeframe)
        .with_context(|| format!("Unrecognized response_timeframe: {}", timeframe))?;

    let reasoning = value
        .get("reasoning")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    Ok(PriorityAssessment {
        level,
        response_timeframe,
        reasoning,
    })
}
