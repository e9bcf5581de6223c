use std::collections::HashSet;

use tracing::{debug, info};

use crate::constants;
use crate::domain::{ClassifiedRecord, FeedbackRecord, IssueRecord};
use crate::pipeline::processing::duration::DurationCalculator;
use crate::pipeline::processing::override_rules::OverrideRuleEngine;
use crate::pipeline::processing::status_filter::normalize_status;

/// Classified records plus the diagnostics gathered on the way
#[derive(Debug, Default)]
pub struct Classification {
    pub records: Vec<ClassifiedRecord>,
    pub issues: Vec<IssueRecord>,
    /// Records without an error code or with an ignored one
    pub skipped: usize,
}

/// Runs the duration and responsibility stages over filtered weekly records
pub struct Classifier<'h> {
    duration: DurationCalculator<'h>,
    rules: OverrideRuleEngine<'h>,
    ignored_codes: HashSet<i64>,
}

impl<'h> Classifier<'h> {
    pub fn new(
        duration: DurationCalculator<'h>,
        rules: OverrideRuleEngine<'h>,
        ignored_codes: HashSet<i64>,
    ) -> Self {
        Self {
            duration,
            rules,
            ignored_codes,
        }
    }

    pub fn classify(&self, weekly: &[FeedbackRecord]) -> Classification {
        info!("Processing {} records...", weekly.len());
        let mut out = Classification::default();

        for record in weekly {
            let Some(error_code) = record.error_code else {
                out.skipped += 1;
                continue;
            };
            if self.ignored_codes.contains(&error_code) {
                out.skipped += 1;
                continue;
            }

            let resolution = self.rules.resolve(record, error_code);
            if !resolution.mapped {
                debug!("No mapping rule for error code {}", error_code);
                out.issues.push(IssueRecord {
                    issue_type: constants::ISSUE_MISSING_MAPPING.to_string(),
                    customer_number: record.customer_number.clone(),
                    fund_identity: record.fund_identity.clone(),
                    fund_tax: record.fund_tax.clone(),
                    employee_id: record.employee_id.clone(),
                    error_code,
                    feedback_status: normalize_status(&record.status),
                });
            }

            out.records.push(ClassifiedRecord {
                customer_number: record.customer_number.clone(),
                employee_id: record.employee_id.clone(),
                fund_identity: record.fund_identity.clone(),
                fund_tax: record.fund_tax.clone(),
                error_code,
                error_description: record.error_description.clone(),
                update_date: match record.update_date {
                    Some(ts) => ts.into(),
                    None => record.update_date_raw.clone(),
                },
                duration_weeks: self.duration.weeks_in_state(record),
                responsibility: resolution.responsibility,
                override_triggered: resolution.override_triggered,
                original_status: record.status.clone(),
            });
        }

        info!(
            "Classified {} records ({} skipped, {} unmapped)",
            out.records.len(),
            out.skipped,
            out.issues.len()
        );
        out
    }
}
