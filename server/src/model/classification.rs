use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
pub enum Category {
    Personal,
    Work,
    Marketing,
    Notification,
    Support,
    Other,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

/// Structured result of the classification stage.
/// Produced once per message and never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub category: Category,
    pub subcategory: String,
    /// 1 (lowest) to 5 (highest).
    pub urgency: u8,
    pub contains_question: bool,
    pub entities: Vec<String>,
    pub action_items: Vec<String>,
    pub sentiment: Sentiment,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_round_trip() {
        for name in ["Personal", "Work", "Marketing", "Notification", "Support", "Other"] {
            let category: Category = name.parse().unwrap();
            assert_eq!(category.to_string(), name);
        }
        assert!("Spam".parse::<Category>().is_err());
    }

    #[test]
    fn test_sentiment_parse() {
        assert_eq!("Neutral".parse::<Sentiment>().unwrap(), Sentiment::Neutral);
        assert!("meh".parse::<Sentiment>().is_err());
    }
}
