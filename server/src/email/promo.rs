/// Case-insensitive cue-phrase filter that catches promotional mail before
/// any model call is spent on it.
#[derive(Debug, Clone)]
pub struct PromotionalFilter {
    cues: Vec<String>,
}

impl PromotionalFilter {
    pub fn new(cue_phrases: &[String]) -> Self {
        Self {
            cues: cue_phrases.iter().map(|c| c.to_lowercase()).collect(),
        }
    }

    /// True when the subject or cleaned body contains any cue phrase.
    pub fn is_promotional(&self, subject: &str, body: &str) -> bool {
        let subject = subject.to_lowercase();
        let body = body.to_lowercase();

        self.cues
            .iter()
            .any(|cue| subject.contains(cue.as_str()) || body.contains(cue.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::server_config::default_cue_phrases;

    fn filter() -> PromotionalFilter {
        PromotionalFilter::new(&default_cue_phrases())
    }

    #[test]
    fn test_flags_discount_language() {
        let f = filter();

        assert!(f.is_promotional("Get 50% off today only!", "Shop the sale before it ends."));
        assert!(f.is_promotional("Weekly update", "Use promo code SAVE20 at checkout."));
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let f = filter();

        assert!(f.is_promotional("LIMITED TIME offer", ""));
        assert!(f.is_promotional("", "Click here to UNSUBSCRIBE."));
    }

    #[test]
    fn test_ordinary_mail_passes() {
        let f = filter();

        assert!(!f.is_promotional(
            "Quarterly planning",
            "Can you send over the revised deck before Thursday?"
        ));
    }
}
