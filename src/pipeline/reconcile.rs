use tracing::{info, instrument};

use crate::config::ReconConfig;
use crate::domain::{FeedbackRecord, Table};
use crate::pipeline::processing::aggregate::{aggregate, Aggregation};
use crate::pipeline::processing::classify::{Classification, Classifier};
use crate::pipeline::processing::duration::DurationCalculator;
use crate::pipeline::processing::extract::MappingTable;
use crate::pipeline::processing::history::HistoryIndex;
use crate::pipeline::processing::override_rules::OverrideRuleEngine;
use crate::pipeline::processing::status_filter::StatusFilter;
use crate::pipeline::report;

/// Everything a run computes, before anything is written
#[derive(Debug, Default)]
pub struct ReconOutcome {
    pub loaded: usize,
    pub filtered: usize,
    pub classification: Classification,
    pub aggregation: Aggregation,
}

impl ReconOutcome {
    /// Nothing left to report after filtering and classification
    pub fn is_empty(&self) -> bool {
        self.classification.records.is_empty()
    }

    pub fn overrides_triggered(&self) -> usize {
        self.classification
            .records
            .iter()
            .filter(|r| r.override_triggered)
            .count()
    }

    /// Output tables in artifact order
    pub fn tables(&self) -> Vec<Table> {
        vec![
            report::detail_table(&self.classification.records),
            report::pivot_source_table(&self.aggregation),
            report::summary_table(&self.aggregation),
            report::issues_table(&self.classification.issues),
        ]
    }
}

/// One full batch pass: filter, classify against history, aggregate.
///
/// Pure over its inputs; loading and writing happen in the use case.
#[instrument(skip_all, fields(weekly = weekly.len(), history = history.len()))]
pub fn reconcile(
    weekly: Vec<FeedbackRecord>,
    history: Vec<FeedbackRecord>,
    mapping: &MappingTable,
    config: &ReconConfig,
) -> ReconOutcome {
    let loaded = weekly.len();

    info!("Filtering weekly data...");
    let filtered = StatusFilter::new(&config.filter).apply(weekly);

    let history = HistoryIndex::build(history);
    let classifier = Classifier::new(
        DurationCalculator::new(&history),
        OverrideRuleEngine::new(&history, mapping, &config.rules),
        config.rules.ignored_code_set(),
    );
    let classification = classifier.classify(&filtered);
    let aggregation = aggregate(&classification.records);

    ReconOutcome {
        loaded,
        filtered: filtered.len(),
        classification,
        aggregation,
    }
}
