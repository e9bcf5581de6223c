// Observability: run metrics and their Prometheus rendering

pub mod metrics;

pub use metrics::{init, render};
