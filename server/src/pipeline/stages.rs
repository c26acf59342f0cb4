//! Timeout wrappers around the model-backed stages. A stage that overruns
//! its deadline fails the same way as a stage that errors.

use std::time::Duration;

use crate::error::ProcessError;
use crate::model::classification::Classification;
use crate::model::message::InboundMessage;
use crate::model::priority::PriorityAssessment;
use crate::prompt::respond::{GeneratedReply, ResponseRequest};
use crate::prompt::{classify, prioritize, respond, ChatModel};
use crate::retrieval::{Embedder, ReplyIndex};
use crate::server_config::RetrievalConfig;

pub async fn classify_stage(
    model: &dyn ChatModel,
    message: &InboundMessage,
    cleaned_body: &str,
    timeout: Duration,
) -> Result<Classification, ProcessError> {
    match tokio::time::timeout(timeout, classify::classify(model, message, cleaned_body)).await {
        Ok(result) => result,
        Err(_) => Err(ProcessError::Classification(format!(
            "timed out after {:?}",
            timeout
        ))),
    }
}

pub async fn prioritize_stage(
    model: &dyn ChatModel,
    classification: &Classification,
    timeout: Duration,
) -> Result<PriorityAssessment, ProcessError> {
    match tokio::time::timeout(timeout, prioritize::prioritize(model, classification)).await {
        Ok(result) => result,
        Err(_) => Err(ProcessError::Prioritization(format!(
            "timed out after {:?}",
            timeout
        ))),
    }
}

/// Similar-reply context for generation. Retrieval is best-effort: a missing
/// index yields empty context, and an error or timeout degrades to empty
/// context instead of failing the message. The bool reports degradation.
pub async fn retrieve_stage(
    index: Option<&ReplyIndex>,
    embedder: &dyn Embedder,
    cleaned_body: &str,
    cfg: &RetrievalConfig,
    timeout: Duration,
) -> (String, bool) {
    let Some(index) = index else {
        return (String::new(), false);
    };

    let error = match tokio::time::timeout(timeout, index.query_context(embedder, cleaned_body, cfg))
        .await
    {
        Ok(Ok(context)) => return (context, false),
        Ok(Err(e)) => ProcessError::Retrieval(e.to_string()),
        Err(_) => ProcessError::Retrieval(format!("timed out after {:?}", timeout)),
    };

    tracing::warn!("Generating without context: {}", error);
    (String::new(), true)
}

pub async fn respond_stage(
    model: &dyn ChatModel,
    request: &ResponseRequest<'_>,
    timeout: Duration,
) -> Result<GeneratedReply, ProcessError> {
    match tokio::time::timeout(timeout, respond::respond(model, request)).await {
        Ok(result) => result,
        Err(_) => Err(ProcessError::ResponseGeneration(format!(
            "timed out after {:?}",
            timeout
        ))),
    }
}
