// Reconciliation stages, leaves first

pub mod schema;
pub mod extract;
pub mod status_filter;
pub mod history;
pub mod duration;
pub mod override_rules;
pub mod classify;
pub mod aggregate;
