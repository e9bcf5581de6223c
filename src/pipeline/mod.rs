// Batch reconciliation pipeline: processing stages and output tables

pub mod processing;
pub mod reconcile;
pub mod report;

pub use reconcile::{reconcile, ReconOutcome};
