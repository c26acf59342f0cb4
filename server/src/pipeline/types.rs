use crate::error::ProcessError;
use crate::model::classification::Classification;
use crate::model::priority::PriorityAssessment;

/// Why a message ended without a draft.
#[derive(Debug)]
pub enum DiscardReason {
    Promotional,
    QuotaDenied,
    NoReplyNeeded,
    StageFailed(ProcessError),
}

impl DiscardReason {
    /// Definitive discards mean the message was fully considered and will
    /// never produce a draft, so it is marked read. Stage failures are
    /// transient: the message stays unread and is retried next batch.
    pub fn is_definitive(&self) -> bool {
        !matches!(self, DiscardReason::StageFailed(_))
    }
}

#[derive(Debug)]
pub enum MessageOutcome {
    Persisted { draft_id: String },
    Discarded { reason: DiscardReason },
}

/// Per-message record of how far the pipeline got and how it ended.
#[derive(Debug)]
pub struct MessageReport {
    pub message_id: String,
    pub classification: Option<Classification>,
    pub priority: Option<PriorityAssessment>,
    pub outcome: MessageOutcome,
}

impl MessageReport {
    pub fn is_persisted(&self) -> bool {
        matches!(self.outcome, MessageOutcome::Persisted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_failures_are_not_definitive() {
        assert!(DiscardReason::Promotional.is_definitive());
        assert!(DiscardReason::QuotaDenied.is_definitive());
        assert!(DiscardReason::NoReplyNeeded.is_definitive());
        assert!(!DiscardReason::StageFailed(ProcessError::Classification(
            "bad json".to_string()
        ))
        .is_definitive());
    }
}
