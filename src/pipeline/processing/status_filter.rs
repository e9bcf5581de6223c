use std::collections::HashSet;

use chrono::Duration;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::config::FilterConfig;
use crate::domain::FeedbackRecord;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Collapse whitespace runs to one space and trim both ends
pub fn normalize_status(status: &str) -> String {
    WHITESPACE.replace_all(status, " ").trim().to_string()
}

/// Narrows the weekly extract to actionable records in the trailing window
pub struct StatusFilter {
    allowed: HashSet<String>,
    window: Duration,
}

impl StatusFilter {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            allowed: config.statuses.iter().map(|s| normalize_status(s)).collect(),
            // Out-of-range windows saturate instead of panicking inside chrono
            window: Duration::try_days(config.window_days.max(0)).unwrap_or(Duration::MAX),
        }
    }

    pub fn is_actionable(&self, status: &str) -> bool {
        self.allowed.contains(&normalize_status(status))
    }

    /// Status allow-list first, then the window ending at the newest
    /// timestamp of the remaining records.
    ///
    /// Without any valid timestamp the window is skipped; otherwise records
    /// lacking a timestamp fall outside it.
    pub fn apply(&self, records: Vec<FeedbackRecord>) -> Vec<FeedbackRecord> {
        let total = records.len();
        let by_status: Vec<FeedbackRecord> = records
            .into_iter()
            .filter(|r| self.is_actionable(&r.status))
            .collect();
        info!("Status filter: {} -> {} records", total, by_status.len());

        let Some(max_date) = by_status.iter().filter_map(|r| r.update_date).max() else {
            info!("No valid update timestamps, skipping date window");
            return by_status;
        };

        // None when the window reaches past the earliest representable date
        let start = max_date.checked_sub_signed(self.window);
        let before = by_status.len();
        let windowed: Vec<FeedbackRecord> = by_status
            .into_iter()
            .filter(|r| {
                matches!(r.update_date, Some(ts) if start.map_or(true, |s| ts >= s) && ts <= max_date)
            })
            .collect();

        info!(
            "Filtered by date: {} -> {} records (Max Date: {})",
            before,
            windowed.len(),
            max_date.date()
        );
        windowed
    }
}
