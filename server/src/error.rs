use derive_more::derive::Display;
use reqwest::StatusCode;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Display)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
    RequestTimeout,
    TooManyRequests,
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(error)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        tracing::error!("Reqwest error: {:?}", error);
        match error.status() {
            Some(StatusCode::BAD_REQUEST) => AppError::BadRequest(error.to_string()),
            Some(StatusCode::REQUEST_TIMEOUT) => AppError::RequestTimeout,
            Some(StatusCode::TOO_MANY_REQUESTS) => AppError::TooManyRequests,
            _ => AppError::Internal(error.into()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::Internal(error.into())
    }
}

/// Failure of a single message's pipeline run. These terminate only that
/// message; sibling messages, the user loop, and the batch loop continue.
#[derive(Debug, Display)]
pub enum ProcessError {
    #[display("classification failed: {_0}")]
    Classification(String),
    #[display("prioritization failed: {_0}")]
    Prioritization(String),
    #[display("retrieval failed: {_0}")]
    Retrieval(String),
    #[display("response generation failed: {_0}")]
    ResponseGeneration(String),
    #[display("persistence failed: {_0}")]
    Persistence(String),
}

impl std::error::Error for ProcessError {}

impl ProcessError {
    /// Short stage label used in counters and log lines.
    pub fn stage(&self) -> &'static str {
        match self {
            ProcessError::Classification(_) => "classification",
            ProcessError::Prioritization(_) => "prioritization",
            ProcessError::Retrieval(_) => "retrieval",
            ProcessError::ResponseGeneration(_) => "response_generation",
            ProcessError::Persistence(_) => "persistence",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_error_display() {
        let err = ProcessError::Classification("missing category".to_string());
        assert_eq!(err.to_string(), "classification failed: missing category");
        assert_eq!(
            ProcessError::Persistence("store offline".to_string()).to_string(),
            "persistence failed: store offline"
        );
    }
}
