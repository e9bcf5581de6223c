use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

use crate::domain::FeedbackRecord;
use crate::pipeline::processing::history::HistoryIndex;

/// Monday of the calendar week containing `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Length of the week-over-week Monday chain ending at the most recent date.
///
/// Dates are folded to their week start and deduplicated, so gaps inside a
/// week and input order do not matter. An empty input counts as one week.
pub fn consecutive_weeks<I>(dates: I) -> u32
where
    I: IntoIterator<Item = NaiveDateTime>,
{
    let weeks: BTreeSet<NaiveDate> = dates.into_iter().map(|d| week_start(d.date())).collect();

    let mut newest_first = weeks.iter().rev();
    let Some(mut current) = newest_first.next().copied() else {
        return 1;
    };

    let mut streak = 1;
    for &previous in newest_first {
        if (current - previous).num_days() != 7 {
            break;
        }
        streak += 1;
        current = previous;
    }
    streak
}

/// Counts how many consecutive weeks a weekly record has been in the same
/// identity/error state
pub struct DurationCalculator<'h> {
    history: &'h HistoryIndex,
}

impl<'h> DurationCalculator<'h> {
    pub fn new(history: &'h HistoryIndex) -> Self {
        Self { history }
    }

    pub fn weeks_in_state(&self, record: &FeedbackRecord) -> u32 {
        let matched = record
            .identity_key()
            .map(|key| {
                self.history
                    .same_identity(&key)
                    .filter_map(|h| h.update_date)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        consecutive_weeks(record.update_date.into_iter().chain(matched))
    }
}
