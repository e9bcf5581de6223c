use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};
use tracing::debug;

use crate::app::ports::{SheetSelector, TableSource};
use crate::domain::{parse_timestamp, CellValue, Table};
use crate::error::{ReconError, Result};

/// Reads spreadsheets through calamine (xlsx, xlsm, xlsb, xls, ods) and plain
/// `.csv` files, which expose a single sheet named after the file stem.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkbookSource;

impl WorkbookSource {
    pub fn new() -> Self {
        Self
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

fn csv_sheet_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("data")
        .to_string()
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::Float(f) if f.fract() == 0.0 => format!("{:.0}", f),
        other => data_to_cell(other).to_text(),
    }
}

fn data_to_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Float(*f),
        Data::Int(i) => CellValue::Int(*i),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(CellValue::DateTime)
            .unwrap_or(CellValue::Float(dt.as_f64())),
        Data::DateTimeIso(s) => parse_timestamp(s)
            .map(CellValue::DateTime)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        // Formula errors carry no usable value
        Data::Error(_) => CellValue::Empty,
    }
}

fn range_to_table(name: &str, range: &Range<Data>) -> Table {
    let mut rows = range.rows();
    let headers = rows
        .next()
        .map(|row| row.iter().map(header_text).collect())
        .unwrap_or_default();

    let mut table = Table::new(name, headers);
    for row in rows {
        if row.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }
        table.push_row(row.iter().map(data_to_cell).collect());
    }
    table
}

fn csv_field(field: &str) -> CellValue {
    if field.trim().is_empty() {
        CellValue::Empty
    } else {
        CellValue::Text(field.to_string())
    }
}

impl WorkbookSource {
    fn resolve_sheet(&self, path: &Path, sheet: &SheetSelector) -> Result<String> {
        let names = self.sheet_names(path)?;
        match sheet {
            SheetSelector::First => names.into_iter().next().ok_or_else(|| ReconError::SheetNotFound {
                path: path.display().to_string(),
                sheet: "<first>".to_string(),
            }),
            SheetSelector::Named(name) if names.iter().any(|n| n == name) => Ok(name.clone()),
            SheetSelector::Named(name) => Err(ReconError::SheetNotFound {
                path: path.display().to_string(),
                sheet: name.clone(),
            }),
        }
    }

    fn load_csv(&self, path: &Path, name: String) -> Result<Table> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let headers = reader.headers()?.iter().map(str::to_string).collect();

        let mut table = Table::new(name, headers);
        for record in reader.records() {
            let record = record?;
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            table.push_row(record.iter().map(csv_field).collect());
        }
        Ok(table)
    }
}

impl TableSource for WorkbookSource {
    fn sheet_names(&self, path: &Path) -> Result<Vec<String>> {
        if !path.exists() {
            return Err(ReconError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Input file not found: {}", path.display()),
            )));
        }
        if is_csv(path) {
            return Ok(vec![csv_sheet_name(path)]);
        }
        let workbook = open_workbook_auto(path)?;
        Ok(workbook.sheet_names().to_vec())
    }

    fn load_table(&self, path: &Path, sheet: &SheetSelector) -> Result<Table> {
        let name = self.resolve_sheet(path, sheet)?;
        debug!("Reading sheet '{}' from {}", name, path.display());

        if is_csv(path) {
            return self.load_csv(path, name);
        }

        let mut workbook = open_workbook_auto(path)?;
        let range = workbook.worksheet_range(&name)?;
        Ok(range_to_table(&name, &range))
    }

    fn read_headers(&self, path: &Path, sheet: &SheetSelector) -> Result<Vec<String>> {
        if is_csv(path) {
            self.resolve_sheet(path, sheet)?;
            let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
            return Ok(reader.headers()?.iter().map(str::to_string).collect());
        }
        Ok(self.load_table(path, sheet)?.headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_csv_reads_as_single_sheet_named_after_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weekly.csv");
        fs::write(&path, "CustomerNumber,ErrorCodeV4Id\n1001,4\n,\n1002,\n").unwrap();

        let source = WorkbookSource::new();
        assert_eq!(source.sheet_names(&path).unwrap(), vec!["weekly".to_string()]);

        let table = source.load_table(&path, &SheetSelector::First).unwrap();
        assert_eq!(table.name, "weekly");
        assert_eq!(table.headers, vec!["CustomerNumber", "ErrorCodeV4Id"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 1), &CellValue::from("4"));
        assert_eq!(table.cell(1, 1), &CellValue::Empty);
    }

    #[test]
    fn test_unknown_sheet_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weekly.csv");
        fs::write(&path, "a,b\n1,2\n").unwrap();

        let err = WorkbookSource::new()
            .load_table(&path, &SheetSelector::Named("Sheet9".into()))
            .unwrap_err();
        assert!(matches!(err, ReconError::SheetNotFound { .. }));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = WorkbookSource::new()
            .sheet_names(Path::new("/nonexistent/weekly.xlsx"))
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_calamine_cells_map_to_cell_values() {
        assert_eq!(data_to_cell(&Data::Empty), CellValue::Empty);
        assert_eq!(data_to_cell(&Data::Float(4.0)), CellValue::Float(4.0));
        assert_eq!(data_to_cell(&Data::String("x".into())), CellValue::from("x"));
        assert!(matches!(
            data_to_cell(&Data::DateTimeIso("2025-12-01T08:00:00".into())),
            CellValue::DateTime(_)
        ));
        assert_eq!(header_text(&Data::Float(2025.0)), "2025");
    }
}
