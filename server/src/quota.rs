use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy)]
struct QuotaState {
    remaining: i64,
    unlimited: bool,
}

/// In-process draft quota, seeded from the user store before a batch run
/// and written back after it. `charge_draft` is the only mutation and runs
/// under a single lock, so concurrent pipelines charging against the same
/// user never overspend.
#[derive(Debug, Default)]
pub struct QuotaLedger {
    states: Mutex<HashMap<String, QuotaState>>,
}

impl QuotaLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, user_id: &str, remaining: i64, unlimited: bool) {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states.insert(
            user_id.to_string(),
            QuotaState {
                remaining,
                unlimited,
            },
        );
    }

    /// Read-only probe; does not spend anything.
    pub fn can_create_draft(&self, user_id: &str) -> bool {
        let states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states
            .get(user_id)
            .map(|s| s.unlimited || s.remaining > 0)
            .unwrap_or(false)
    }

    /// Spend one draft. Check and decrement happen under the same lock:
    /// with N concurrent charges against a quota of K, exactly K succeed.
    pub fn charge_draft(&self, user_id: &str) -> bool {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        match states.get_mut(user_id) {
            Some(s) if s.unlimited => true,
            Some(s) if s.remaining > 0 => {
                s.remaining -= 1;
                true
            }
            _ => false,
        }
    }

    /// Return a spent charge whose draft never made it into the store, so
    /// the message can be retried next run without paying twice.
    pub fn refund_draft(&self, user_id: &str) {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(s) = states.get_mut(user_id) {
            if !s.unlimited {
                s.remaining += 1;
            }
        }
    }

    /// Remaining drafts after this run, for write-back. None for users
    /// never seeded.
    pub fn remaining(&self, user_id: &str) -> Option<i64> {
        let states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states.get(user_id).map(|s| s.remaining)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_charge_decrements_until_exhausted() {
        let ledger = QuotaLedger::new();
        ledger.seed("u1", 2, false);

        assert!(ledger.charge_draft("u1"));
        assert!(ledger.charge_draft("u1"));
        assert!(!ledger.charge_draft("u1"));
        assert_eq!(ledger.remaining("u1"), Some(0));
    }

    #[test]
    fn test_unlimited_never_exhausts() {
        let ledger = QuotaLedger::new();
        ledger.seed("u1", 0, true);

        for _ in 0..50 {
            assert!(ledger.charge_draft("u1"));
        }
        assert!(ledger.can_create_draft("u1"));
    }

    #[test]
    fn test_refund_restores_spent_charge() {
        let ledger = QuotaLedger::new();
        ledger.seed("u1", 1, false);

        assert!(ledger.charge_draft("u1"));
        assert!(!ledger.charge_draft("u1"));

        ledger.refund_draft("u1");

        assert_eq!(ledger.remaining("u1"), Some(1));
        assert!(ledger.charge_draft("u1"));
    }

    #[test]
    fn test_refund_ignores_unseeded_and_unlimited_users() {
        let ledger = QuotaLedger::new();
        ledger.refund_draft("ghost");
        assert_eq!(ledger.remaining("ghost"), None);

        ledger.seed("u1", 0, true);
        ledger.refund_draft("u1");
        assert_eq!(ledger.remaining("u1"), Some(0));
    }

    #[test]
    fn test_unseeded_user_cannot_charge() {
        let ledger = QuotaLedger::new();

        assert!(!ledger.can_create_draft("ghost"));
        assert!(!ledger.charge_draft("ghost"));
        assert_eq!(ledger.remaining("ghost"), None);
    }

    #[tokio::test]
    async fn test_concurrent_charges_never_overspend() {
        const QUOTA: i64 = 7;
        const TASKS: usize = 40;

        let ledger = Arc::new(QuotaLedger::new());
        ledger.seed("u1", QUOTA, false);

        let handles: Vec<_> = (0..TASKS)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                tokio::spawn(async move { ledger.charge_draft("u1") })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }

        assert_eq!(successes, QUOTA as usize);
        assert_eq!(ledger.remaining("u1"), Some(0));
    }
}
