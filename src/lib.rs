pub mod app;
pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod infra;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod server;

pub use app::{ReconcileUseCase, RunInputs, RunReport};
pub use config::ReconConfig;
pub use error::{ReconError, Result};
