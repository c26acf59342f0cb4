use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
pub enum PriorityLevel {
    Critical,
    High,
    Medium,
    Low,
    Ignore,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
pub enum ResponseTimeframe {
    Immediate,
    Today,
    #[strum(serialize = "This Week", serialize = "ThisWeek")]
    ThisWeek,
    #[strum(serialize = "When Convenient", serialize = "WhenConvenient")]
    WhenConvenient,
    #[strum(serialize = "No Response Needed", serialize = "NoResponseNeeded")]
    NoResponseNeeded,
}

/// Structured result of the prioritization stage, 1:1 with a message.
/// Only ever computed after a successful classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityAssessment {
    pub level: PriorityLevel,
    pub response_timeframe: ResponseTimeframe,
    pub reasoning: String,
}

impl PriorityAssessment {
    /// A message the user should never auto-reply to.
    pub fn needs_no_reply(&self) -> bool {
        self.level == PriorityLevel::Ignore
            || self.response_timeframe == ResponseTimeframe::NoResponseNeeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_accepts_spaced_and_compact_forms() {
        assert_eq!(
            "This Week".parse::<ResponseTimeframe>().unwrap(),
            ResponseTimeframe::ThisWeek
        );
        assert_eq!(
            "NoResponseNeeded".parse::<ResponseTimeframe>().unwrap(),
            ResponseTimeframe::NoResponseNeeded
        );
        assert!("Someday".parse::<ResponseTimeframe>().is_err());
    }

    #[test]
    fn test_needs_no_reply() {
        let ignore = PriorityAssessment {
            level: PriorityLevel::Ignore,
            response_timeframe: ResponseTimeframe::Today,
            reasoning: String::new(),
        };
        assert!(ignore.needs_no_reply());

        let high = PriorityAssessment {
            level: PriorityLevel::High,
            response_timeframe: ResponseTimeframe::Today,
            reasoning: String::new(),
        };
        assert!(!high.needs_no_reply());
    }
}
