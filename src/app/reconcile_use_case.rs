use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::app::ports::{PivotBuilder, TableSink, TableSource};
use crate::config::{InputConfig, ReconConfig};
use crate::constants;
use crate::error::Result;
use crate::observability::metrics::run as run_metrics;
use crate::pipeline::processing::extract::RecordExtractor;
use crate::pipeline::processing::schema::SchemaResolver;
use crate::pipeline::{reconcile, report, ReconOutcome};

/// The three inputs of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInputs {
    pub weekly: PathBuf,
    pub history: PathBuf,
    pub mapping: PathBuf,
}

impl From<&InputConfig> for RunInputs {
    fn from(config: &InputConfig) -> Self {
        Self {
            weekly: config.weekly.clone(),
            history: config.history.clone(),
            mapping: config.mapping.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunCounts {
    pub weekly_loaded: usize,
    pub history_loaded: usize,
    pub mapping_rules: usize,
    pub filtered: usize,
    pub classified: usize,
    pub skipped: usize,
    pub issues: usize,
    pub overrides_triggered: usize,
}

/// What a caller (CLI or HTTP wrapper) gets back from a run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub ok: bool,
    pub message: String,
    /// Artifact location; `None` when nothing was written
    pub output: Option<PathBuf>,
    pub counts: RunCounts,
    pub pivot_built: bool,
}

/// Use case for one full reconciliation pass: load, reconcile, write, pivot
pub struct ReconcileUseCase {
    source: Box<dyn TableSource>,
    sink: Box<dyn TableSink>,
    pivot: Option<Box<dyn PivotBuilder>>,
    config: ReconConfig,
}

impl ReconcileUseCase {
    pub fn new(
        source: Box<dyn TableSource>,
        sink: Box<dyn TableSink>,
        pivot: Option<Box<dyn PivotBuilder>>,
        config: ReconConfig,
    ) -> Self {
        Self {
            source,
            sink,
            pivot,
            config,
        }
    }

    pub fn config(&self) -> &ReconConfig {
        &self.config
    }

    /// Run the job and record its outcome metrics.
    ///
    /// Errors abort the run before anything is written.
    pub fn run(&self, inputs: &RunInputs, destination: &Path) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("recon_run", run_id = %run_id);
        let _enter = span.enter();
        let started = Instant::now();

        let result = self.run_inner(run_id, inputs, destination);
        let secs = started.elapsed().as_secs_f64();
        match &result {
            Ok(report) if report.output.is_some() => run_metrics::finished("ok", secs),
            Ok(_) => run_metrics::finished("empty", secs),
            Err(e) => {
                warn!("Run failed after {:.2}s: {}", secs, e);
                run_metrics::finished("error", secs);
            }
        }
        result
    }

    fn run_inner(&self, run_id: Uuid, inputs: &RunInputs, destination: &Path) -> Result<RunReport> {
        let extractor =
            RecordExtractor::new(self.source.as_ref(), SchemaResolver::new(&self.config.schema));

        info!("Loading mapping from {}", inputs.mapping.display());
        let mapping = extractor.load_mapping(&inputs.mapping)?;
        info!("Loading history from {}", inputs.history.display());
        let history = extractor.load_feedback(&inputs.history, false, "History")?;
        info!("Loading weekly data from {}", inputs.weekly.display());
        let weekly = extractor.load_feedback(&inputs.weekly, true, "Weekly")?;

        run_metrics::records_loaded("weekly", weekly.len());
        run_metrics::records_loaded("history", history.len());

        let mut counts = RunCounts {
            weekly_loaded: weekly.len(),
            history_loaded: history.len(),
            mapping_rules: mapping.len(),
            ..RunCounts::default()
        };

        let outcome = reconcile(weekly, history, &mapping, &self.config);
        fill_counts(&mut counts, &outcome);
        run_metrics::records_filtered(counts.filtered);
        run_metrics::records_classified(counts.classified);
        run_metrics::issues_reported(counts.issues);
        run_metrics::overrides_triggered(counts.overrides_triggered);

        if outcome.is_empty() {
            info!("{}", constants::NOTHING_TO_DO);
            return Ok(RunReport {
                run_id,
                ok: true,
                message: constants::NOTHING_TO_DO.to_string(),
                output: None,
                counts,
                pivot_built: false,
            });
        }

        info!("Writing results to {}", destination.display());
        self.sink.write_tables(destination, &outcome.tables())?;

        let mut message = format!(
            "Processed {} records ({} overrides, {} unmapped). Output written to {}",
            counts.classified,
            counts.overrides_triggered,
            counts.issues,
            destination.display()
        );

        let pivot_built = match &self.pivot {
            Some(builder) => match builder.build(destination, &report::pivot_layout()) {
                Ok(()) => {
                    info!("Native pivot built in {}", destination.display());
                    true
                }
                Err(e) => {
                    warn!("Pivot build failed, keeping the static summary: {:#}", e);
                    run_metrics::pivot_failed();
                    message.push_str(&format!(". Pivot build failed: {:#}", e));
                    false
                }
            },
            None => false,
        };

        info!("{}", message);
        Ok(RunReport {
            run_id,
            ok: true,
            message,
            output: Some(destination.to_path_buf()),
            counts,
            pivot_built,
        })
    }
}

fn fill_counts(counts: &mut RunCounts, outcome: &ReconOutcome) {
    counts.filtered = outcome.filtered;
    counts.classified = outcome.classification.records.len();
    counts.skipped = outcome.classification.skipped;
    counts.issues = outcome.classification.issues.len();
    counts.overrides_triggered = outcome.overrides_triggered();
}
