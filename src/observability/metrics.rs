use std::fmt;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

/// Every metric the reconciliation job emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    RunsTotal,
    RecordsLoaded,
    RecordsFiltered,
    RecordsClassified,
    IssuesTotal,
    OverridesTriggered,
    PivotFailures,
    RunDuration,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::RunsTotal => "recon_runs_total",
            MetricName::RecordsLoaded => "recon_records_loaded_total",
            MetricName::RecordsFiltered => "recon_records_filtered_total",
            MetricName::RecordsClassified => "recon_records_classified_total",
            MetricName::IssuesTotal => "recon_issues_total",
            MetricName::OverridesTriggered => "recon_overrides_triggered_total",
            MetricName::PivotFailures => "recon_pivot_failures_total",
            MetricName::RunDuration => "recon_run_duration_seconds",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            RunsTotal,
            RecordsLoaded,
            RecordsFiltered,
            RecordsClassified,
            IssuesTotal,
            OverridesTriggered,
            PivotFailures,
            RunDuration,
        ]
        .into_iter()
    }
}

static PROMETHEUS: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the global Prometheus recorder. Calling it again is a no-op.
pub fn init() -> anyhow::Result<()> {
    if PROMETHEUS.get().is_some() {
        return Ok(());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;
    PROMETHEUS.set(handle).ok();
    info!("Metrics system initialized");
    Ok(())
}

/// Prometheus text exposition of everything recorded so far
pub fn render() -> Option<String> {
    PROMETHEUS.get().map(|handle| handle.render())
}

// ============================================================================
// Run Metrics
// ============================================================================

pub mod run {
    use super::MetricName;

    /// Record a finished run; `outcome` is `ok`, `empty` or `error`
    pub fn finished(outcome: &'static str, secs: f64) {
        ::metrics::counter!(MetricName::RunsTotal.as_str(), "outcome" => outcome).increment(1);
        ::metrics::histogram!(MetricName::RunDuration.as_str()).record(secs);
    }

    pub fn records_loaded(source: &'static str, count: usize) {
        ::metrics::counter!(MetricName::RecordsLoaded.as_str(), "source" => source)
            .increment(count as u64);
    }

    pub fn records_filtered(count: usize) {
        ::metrics::counter!(MetricName::RecordsFiltered.as_str()).increment(count as u64);
    }

    pub fn records_classified(count: usize) {
        ::metrics::counter!(MetricName::RecordsClassified.as_str()).increment(count as u64);
    }

    pub fn issues_reported(count: usize) {
        ::metrics::counter!(MetricName::IssuesTotal.as_str()).increment(count as u64);
    }

    pub fn overrides_triggered(count: usize) {
        ::metrics::counter!(MetricName::OverridesTriggered.as_str()).increment(count as u64);
    }

    pub fn pivot_failed() {
        ::metrics::counter!(MetricName::PivotFailures.as_str()).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_prefixed_and_unique() {
        let names: Vec<_> = MetricName::all_metrics().map(|m| m.as_str()).collect();
        assert!(names.iter().all(|n| n.starts_with("recon_")));
        let unique: std::collections::HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
        assert_eq!(MetricName::RunsTotal.to_string(), "recon_runs_total");
    }

    #[test]
    fn test_recording_without_recorder_is_harmless() {
        run::records_loaded("weekly", 3);
        run::finished("ok", 0.5);
    }
}
