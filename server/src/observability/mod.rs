//! Batch run counters and status reporting.

use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};

/// Counters for one batch run. Shared by every message pipeline in the run;
/// all counters are atomic so concurrent pipelines record without locking.
#[derive(Debug, Default)]
pub struct BatchTracker {
    persisted: AtomicUsize,
    promotional: AtomicUsize,
    quota_denied: AtomicUsize,
    no_reply_needed: AtomicUsize,
    stage_failures: AtomicUsize,
    retrieval_degraded: AtomicUsize,
    users_processed: AtomicUsize,
    users_skipped: AtomicUsize,
}

/// Point-in-time snapshot of a [`BatchTracker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub persisted: usize,
    pub promotional: usize,
    pub quota_denied: usize,
    pub no_reply_needed: usize,
    pub stage_failures: usize,
    pub retrieval_degraded: usize,
    pub users_processed: usize,
    pub users_skipped: usize,
}

impl BatchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_persisted(&self) {
        self.persisted.fetch_add(1, Relaxed);
    }

    pub fn record_promotional(&self) {
        self.promotional.fetch_add(1, Relaxed);
    }

    pub fn record_quota_denied(&self) {
        self.quota_denied.fetch_add(1, Relaxed);
    }

    pub fn record_no_reply_needed(&self) {
        self.no_reply_needed.fetch_add(1, Relaxed);
    }

    pub fn record_stage_failure(&self) {
        self.stage_failures.fetch_add(1, Relaxed);
    }

    pub fn record_retrieval_degraded(&self) {
        self.retrieval_degraded.fetch_add(1, Relaxed);
    }

    pub fn record_user_processed(&self) {
        self.users_processed.fetch_add(1, Relaxed);
    }

    pub fn record_user_skipped(&self) {
        self.users_skipped.fetch_add(1, Relaxed);
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            persisted: self.persisted.load(Relaxed),
            promotional: self.promotional.load(Relaxed),
            quota_denied: self.quota_denied.load(Relaxed),
            no_reply_needed: self.no_reply_needed.load(Relaxed),
            stage_failures: self.stage_failures.load(Relaxed),
            retrieval_degraded: self.retrieval_degraded.load(Relaxed),
            users_processed: self.users_processed.load(Relaxed),
            users_skipped: self.users_skipped.load(Relaxed),
        }
    }

    pub fn status_table(&self) -> String {
        let s = self.summary();
        let rows = vec![
            vec!["drafts persisted".to_string(), s.persisted.to_string()],
            vec!["promotional".to_string(), s.promotional.to_string()],
            vec!["quota denied".to_string(), s.quota_denied.to_string()],
            vec!["no reply needed".to_string(), s.no_reply_needed.to_string()],
            vec!["stage failures".to_string(), s.stage_failures.to_string()],
            vec![
                "retrieval degraded".to_string(),
                s.retrieval_degraded.to_string(),
            ],
            vec!["users processed".to_string(), s.users_processed.to_string()],
            vec!["users skipped".to_string(), s.users_skipped.to_string()],
        ];

        format_table(&["outcome", "count"], &rows)
    }
}

fn format_row(list: Vec<String>) -> String {
    format!("| {} |\n", list.join(" | "))
}

fn calculate_column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    (0..headers.len())
        .map(|i| {
            let header_width = headers[i].len();
            let max_row_width = rows
                .iter()
                .filter_map(|row| row.get(i))
                .map(|cell| cell.len())
                .max()
                .unwrap_or(0);
            header_width.max(max_row_width)
        })
        .collect()
}

/// Format a table with headers and rows
pub fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let widths = calculate_column_widths(headers, rows);
    let mut output = String::new();

    let header_line: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
        .collect();
    output.push_str(&format_row(header_line));

    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    output.push_str(&format!("|-{}-|\n", separator.join("-|-")));

    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let width = widths.get(i).copied().unwrap_or(cell.len());
                format!("{:width$}", cell, width = width)
            })
            .collect();
        output.push_str(&format_row(cells));
    }

    output
}
