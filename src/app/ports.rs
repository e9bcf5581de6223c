use std::path::Path;

use serde::Serialize;

use crate::domain::Table;
use crate::error::Result;

/// Which sheet of a workbook to read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetSelector {
    First,
    Named(String),
}

/// Tabular input: spreadsheets, CSV files, in-memory fixtures
pub trait TableSource: Send + Sync {
    fn sheet_names(&self, path: &Path) -> Result<Vec<String>>;

    fn load_table(&self, path: &Path, sheet: &SheetSelector) -> Result<Table>;

    /// Header row only; sources that can read it cheaply should override this
    fn read_headers(&self, path: &Path, sheet: &SheetSelector) -> Result<Vec<String>> {
        Ok(self.load_table(path, sheet)?.headers)
    }
}

/// Writes every output table of a run as one artifact at `destination`
pub trait TableSink: Send + Sync {
    fn write_tables(&self, destination: &Path, tables: &[Table]) -> Result<()>;
}

/// Field layout of the native pivot built over the long-form pivot source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotLayout {
    pub source_sheet: String,
    pub target_sheet: String,
    pub row_fields: Vec<String>,
    pub column_field: String,
    pub value_field: String,
}

/// Optional capability: turn the written artifact's pivot source into a
/// native pivot object. Failures are reported, never fatal.
pub trait PivotBuilder: Send + Sync {
    fn build(&self, artifact: &Path, layout: &PivotLayout) -> anyhow::Result<()>;
}
