use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::app::ports::TableSink;
use crate::domain::Table;
use crate::error::{ReconError, Result};

/// Writes one `.csv` file per table into the destination directory
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvDirectorySink;

impl CsvDirectorySink {
    pub fn new() -> Self {
        Self
    }

    /// File name used for a sheet; spaces become underscores
    pub fn file_name(sheet: &str) -> String {
        let stem: String = sheet
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        format!("{}.csv", stem)
    }

    fn write_one(&self, dir: &Path, table: &Table) -> Result<PathBuf> {
        let path = dir.join(Self::file_name(&table.name));
        let staged = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = csv::Writer::from_writer(staged.as_file());
            writer.write_record(&table.headers)?;
            for row in &table.rows {
                let mut record: Vec<String> = row.iter().map(|c| c.to_text()).collect();
                record.resize(table.headers.len().max(record.len()), String::new());
                writer.write_record(&record)?;
            }
            writer.flush()?;
        }
        staged
            .persist(&path)
            .map_err(|e| ReconError::Output(format!("Failed to write {}: {}", path.display(), e)))?;
        Ok(path)
    }
}

impl TableSink for CsvDirectorySink {
    fn write_tables(&self, destination: &Path, tables: &[Table]) -> Result<()> {
        fs::create_dir_all(destination)?;
        for table in tables {
            let path = self.write_one(destination, table)?;
            info!("Wrote {} rows to {}", table.len(), path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CellValue;

    #[test]
    fn test_one_file_per_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("results");

        let mut pivot = Table::new("PIVOT", vec!["CustomerNumber".into(), "DurationWeeks = 1".into()]);
        pivot.push_row(vec![CellValue::from("1001"), CellValue::Int(2)]);
        pivot.push_row(vec![CellValue::from("1002")]);
        let issues = Table::new("Processing Issues", vec!["IssueType".into()]);

        CsvDirectorySink::new().write_tables(&dest, &[pivot, issues]).unwrap();

        let content = fs::read_to_string(dest.join("PIVOT.csv")).unwrap();
        assert_eq!(content, "CustomerNumber,DurationWeeks = 1\n1001,2\n1002,\n");
        assert!(dest.join("Processing_Issues.csv").exists());
    }
}
