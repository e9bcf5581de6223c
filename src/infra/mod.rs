pub mod csv_output_adapter;
pub mod json_output_adapter;
pub mod pivot_command_adapter;
pub mod workbook_source;

pub use csv_output_adapter::CsvDirectorySink;
pub use json_output_adapter::JsonWorkbookSink;
pub use pivot_command_adapter::CommandPivotBuilder;
pub use workbook_source::WorkbookSource;

use crate::app::ports::{PivotBuilder, TableSink};
use crate::config::{OutputFormat, PivotConfig};

/// Sink for the configured artifact format
pub fn table_sink(format: OutputFormat) -> Box<dyn TableSink> {
    match format {
        OutputFormat::Json => Box::new(JsonWorkbookSink::new()),
        OutputFormat::Csv => Box::new(CsvDirectorySink::new()),
    }
}

pub fn pivot_builder(config: &PivotConfig) -> Option<Box<dyn PivotBuilder>> {
    CommandPivotBuilder::from_config(config).map(|b| Box::new(b) as Box<dyn PivotBuilder>)
}
