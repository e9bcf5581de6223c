use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::app::ports::TableSink;
use crate::domain::Table;
use crate::error::{ReconError, Result};

#[derive(Serialize)]
struct Workbook<'a> {
    sheets: &'a [Table],
}

/// Writes every table of a run into one JSON workbook:
/// `{ "sheets": [{ "name", "headers", "rows" }] }`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonWorkbookSink;

impl JsonWorkbookSink {
    pub fn new() -> Self {
        Self
    }
}

impl TableSink for JsonWorkbookSink {
    fn write_tables(&self, destination: &Path, tables: &[Table]) -> Result<()> {
        let dir = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        // Staged next to the destination so a failed write leaves no artifact
        let mut staged = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(staged.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, &Workbook { sheets: tables })?;
            writer.flush()?;
        }
        staged
            .persist(destination)
            .map_err(|e| ReconError::Output(format!("Failed to write {}: {}", destination.display(), e)))?;

        info!("Wrote {} sheets to {}", tables.len(), destination.display());
        Ok(())
    }
}
