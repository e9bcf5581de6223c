use std::collections::HashSet;

use tracing::warn;

use crate::config::RuleConfig;
use crate::domain::FeedbackRecord;
use crate::pipeline::processing::extract::MappingTable;
use crate::pipeline::processing::history::HistoryIndex;

/// Outcome of the responsibility decision for one weekly record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub responsibility: String,
    /// Prior successful ingestion was found, whether or not it changed the result
    pub override_triggered: bool,
    /// The error code had a mapping rule
    pub mapped: bool,
}

/// Mapping-driven responsibility with the prior-success override
pub struct OverrideRuleEngine<'h> {
    history: &'h HistoryIndex,
    mapping: &'h MappingTable,
    override_codes: HashSet<i64>,
    success_marker: String,
    unknown_responsibility: String,
}

impl<'h> OverrideRuleEngine<'h> {
    pub fn new(history: &'h HistoryIndex, mapping: &'h MappingTable, rules: &RuleConfig) -> Self {
        Self {
            history,
            mapping,
            override_codes: rules.override_code_set(),
            success_marker: rules.success_marker.clone(),
            unknown_responsibility: rules.unknown_responsibility.clone(),
        }
    }

    /// Whether history shows a successful ingestion without an error for the
    /// same customer, fund and employee. The error code is not part of this key.
    pub fn prior_success(&self, record: &FeedbackRecord) -> bool {
        let Some(key) = record.employee_fund_key() else {
            return false;
        };
        self.history
            .same_employee_fund(&key)
            .any(|h| h.has_no_error() && h.status.contains(self.success_marker.as_str()))
    }

    pub fn resolve(&self, record: &FeedbackRecord, error_code: i64) -> Resolution {
        let rule = self.mapping.get(error_code);
        let mut responsibility = rule
            .map(|r| r.default_responsibility.clone())
            .unwrap_or_else(|| self.unknown_responsibility.clone());

        let mut override_triggered = false;
        if self.override_codes.contains(&error_code) && self.prior_success(record) {
            override_triggered = true;
            if let Some(rule) = rule.filter(|r| r.has_override) {
                match &rule.override_responsibility {
                    Some(label) => responsibility = label.clone(),
                    None => warn!(
                        "Error code {} allows an override but has no override responsibility",
                        error_code
                    ),
                }
            }
        }

        Resolution {
            responsibility,
            override_triggered,
            mapped: rule.is_some(),
        }
    }
}
