use std::collections::HashMap;
use std::path::Path;

use tracing::{info, warn};

use crate::app::ports::{SheetSelector, TableSource};
use crate::domain::{CellValue, FeedbackRecord, MappingRule, Table};
use crate::error::{ReconError, Result};
use crate::pipeline::processing::schema::{
    Field, SchemaMap, SchemaResolver, MAPPING_OPTIONAL, MAPPING_REQUIRED,
};

/// Column positions of a resolved schema within one table
struct ColumnLookup {
    positions: HashMap<Field, usize>,
}

impl ColumnLookup {
    fn new(table: &Table, schema: &SchemaMap) -> Self {
        let positions = schema
            .iter()
            .filter_map(|(field, column)| table.column_index(column).map(|idx| (field, idx)))
            .collect();
        Self { positions }
    }

    fn cell<'t>(&self, table: &'t Table, row: usize, field: Field) -> &'t CellValue {
        match self.positions.get(&field) {
            Some(&col) => table.cell(row, col),
            None => &CellValue::Empty,
        }
    }
}

/// Turn every row of a feedback table into a [`FeedbackRecord`].
///
/// Cells that fail to parse (dates, error codes) become `None`; rows are never
/// rejected here.
pub fn extract_feedback(table: &Table, schema: &SchemaMap) -> Vec<FeedbackRecord> {
    let lookup = ColumnLookup::new(table, schema);

    (0..table.len())
        .map(|row| {
            let update_cell = lookup.cell(table, row, Field::UpdateDate);
            FeedbackRecord {
                customer_number: lookup.cell(table, row, Field::CustomerNumber).as_key_text(),
                fund_identity: lookup.cell(table, row, Field::FundIdentity).as_key_text(),
                fund_tax: lookup.cell(table, row, Field::FundTax).as_key_text(),
                employee_id: lookup.cell(table, row, Field::EmployeeId).as_key_text(),
                status: lookup.cell(table, row, Field::FeedbackStatus).to_text(),
                error_code: lookup.cell(table, row, Field::ErrorCode).as_error_code(),
                error_description: lookup
                    .cell(table, row, Field::ErrorDescription)
                    .as_key_text(),
                update_date: update_cell.as_timestamp(),
                update_date_raw: update_cell.clone(),
            }
        })
        .collect()
}

/// Error code -> rule lookup, immutable once loaded
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    rules: HashMap<i64, MappingRule>,
}

impl MappingTable {
    pub fn new(rules: impl IntoIterator<Item = MappingRule>) -> Self {
        let mut table = Self::default();
        for rule in rules {
            table.insert(rule);
        }
        table
    }

    fn insert(&mut self, rule: MappingRule) {
        let code = rule.error_code;
        if self.rules.insert(code, rule).is_some() {
            warn!("Mapping table lists error code {} more than once; keeping the last row", code);
        }
    }

    pub fn get(&self, error_code: i64) -> Option<&MappingRule> {
        self.rules.get(&error_code)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

pub fn extract_mapping(table: &Table, schema: &SchemaMap) -> MappingTable {
    let lookup = ColumnLookup::new(table, schema);
    let mut mapping = MappingTable::default();

    for row in 0..table.len() {
        let Some(error_code) = lookup.cell(table, row, Field::ErrorCode).as_error_code() else {
            if !table.rows[row].iter().all(CellValue::is_blank) {
                warn!("Skipping mapping row {} without an integer error code", row + 2);
            }
            continue;
        };

        mapping.insert(MappingRule {
            error_code,
            default_responsibility: lookup
                .cell(table, row, Field::DefaultResponsibility)
                .to_text()
                .trim()
                .to_string(),
            has_override: lookup.cell(table, row, Field::HasOverrideCondition).as_flag(),
            override_responsibility: lookup
                .cell(table, row, Field::OverrideResponsibility)
                .as_key_text(),
        });
    }

    mapping
}

/// Loads the three inputs of a run and resolves their schemas
pub struct RecordExtractor<'a> {
    source: &'a dyn TableSource,
    resolver: SchemaResolver<'a>,
}

impl<'a> RecordExtractor<'a> {
    pub fn new(source: &'a dyn TableSource, resolver: SchemaResolver<'a>) -> Self {
        Self { source, resolver }
    }

    /// Locate the data sheet of a feedback workbook.
    ///
    /// Sheets that cannot be read are skipped with a warning.
    pub fn find_data_sheet(&self, path: &Path) -> Result<String> {
        info!("Scanning sheets in {}", path.display());
        let mut candidates = Vec::new();
        for sheet in self.source.sheet_names(path)? {
            match self.source.read_headers(path, &SheetSelector::Named(sheet.clone())) {
                Ok(headers) => candidates.push((sheet, headers)),
                Err(e) => warn!("Unable to open sheet {}: {}", sheet, e),
            }
        }

        self.resolver
            .select_data_sheet(&candidates)
            .map(str::to_string)
            .ok_or_else(|| ReconError::NoDataSheet(path.display().to_string()))
    }

    /// Load a weekly or historical extract into records
    pub fn load_feedback(
        &self,
        path: &Path,
        with_description: bool,
        source_name: &str,
    ) -> Result<Vec<FeedbackRecord>> {
        let sheet = self.find_data_sheet(path)?;
        info!("{}: using sheet '{}' of {}", source_name, sheet, path.display());

        let table = self.source.load_table(path, &SheetSelector::Named(sheet))?;
        let schema = self
            .resolver
            .resolve_feedback(&table.headers, with_description, source_name)?;

        let records = extract_feedback(&table, &schema);
        info!("{}: loaded {} rows", source_name, records.len());
        Ok(records)
    }

    /// Load the error code mapping from the first sheet of its workbook
    pub fn load_mapping(&self, path: &Path) -> Result<MappingTable> {
        let table = self.source.load_table(path, &SheetSelector::First)?;
        let schema = self
            .resolver
            .resolve(&table.headers, MAPPING_REQUIRED, MAPPING_OPTIONAL, "Mapping")?;
        let mapping = extract_mapping(&table, &schema);
        info!("Mapping: loaded {} rules from {}", mapping.len(), path.display());
        Ok(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaConfig;

    /// Workbook with named sheets; sheets listed in `broken` fail to open
    struct SheetedSource {
        sheets: Vec<Table>,
        broken: Vec<&'static str>,
    }

    impl TableSource for SheetedSource {
        fn sheet_names(&self, _path: &Path) -> Result<Vec<String>> {
            Ok(self.sheets.iter().map(|t| t.name.clone()).collect())
        }

        fn load_table(&self, path: &Path, sheet: &SheetSelector) -> Result<Table> {
            let not_found = |name: &str| ReconError::SheetNotFound {
                path: path.display().to_string(),
                sheet: name.to_string(),
            };
            let SheetSelector::Named(name) = sheet else {
                return self.sheets.first().cloned().ok_or_else(|| not_found("<first>"));
            };
            if self.broken.contains(&name.as_str()) {
                return Err(not_found(name));
            }
            self.sheets
                .iter()
                .find(|t| &t.name == name)
                .cloned()
                .ok_or_else(|| not_found(name))
        }
    }

    fn named(name: &str, headers: &[&str]) -> Table {
        Table::new(name, headers.iter().map(|h| h.to_string()).collect())
    }

    fn table(headers: &[&str], rows: Vec<Vec<CellValue>>) -> Table {
        let mut t = Table::new("t", headers.iter().map(|h| h.to_string()).collect());
        for row in rows {
            t.push_row(row);
        }
        t
    }

    #[test]
    fn test_extract_feedback_coerces_bad_cells_to_none() {
        let config = SchemaConfig::default();
        let resolver = SchemaResolver::new(&config);
        let t = table(
            &[
                "CustomerNumber",
                "KodKupa_IdentityNumber",
                "KodKupa_IncomeTax",
                "MISPAR_MEZAHE_OVED",
                "FeedbackStatus",
                "ErrorCodeV4Id",
                "UpdateDate",
            ],
            vec![vec![
                CellValue::Float(1001.0),
                CellValue::from("510"),
                CellValue::Empty,
                CellValue::from("300"),
                CellValue::from("  status  "),
                CellValue::from("oops"),
                CellValue::from("yesterday"),
            ]],
        );
        let schema = resolver.resolve_feedback(&t.headers, false, "Weekly").unwrap();
        let records = extract_feedback(&t, &schema);

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.customer_number.as_deref(), Some("1001"));
        assert_eq!(r.fund_tax, None);
        assert_eq!(r.status, "  status  ");
        assert_eq!(r.error_code, None);
        assert_eq!(r.update_date, None);
        assert_eq!(r.update_date_raw, CellValue::from("yesterday"));
    }

    #[test]
    fn test_extract_mapping_reads_flags_and_keeps_last_duplicate() {
        let config = SchemaConfig::default();
        let resolver = SchemaResolver::new(&config);
        let t = table(
            &[
                "ErrorCodeV4Id",
                "DefaultResponsibility",
                "HasOverrideCondition",
                "OverrideResponsibility",
            ],
            vec![
                vec![
                    CellValue::Float(4.0),
                    CellValue::from("Employer"),
                    CellValue::Bool(true),
                    CellValue::from("Producer"),
                ],
                vec![
                    CellValue::Int(7),
                    CellValue::from("Producer"),
                    CellValue::Bool(false),
                    CellValue::Empty,
                ],
                vec![
                    CellValue::Int(7),
                    CellValue::from("Operations"),
                    CellValue::from("no"),
                    CellValue::Empty,
                ],
                vec![CellValue::Empty, CellValue::from("orphan"), CellValue::Empty, CellValue::Empty],
            ],
        );
        let schema = resolver
            .resolve(&t.headers, MAPPING_REQUIRED, MAPPING_OPTIONAL, "Mapping")
            .unwrap();
        let mapping = extract_mapping(&t, &schema);

        assert_eq!(mapping.len(), 2);
        let four = mapping.get(4).unwrap();
        assert!(four.has_override);
        assert_eq!(four.override_responsibility.as_deref(), Some("Producer"));
        assert_eq!(mapping.get(7).unwrap().default_responsibility, "Operations");
        assert!(mapping.get(99).is_none());
    }

    #[test]
    fn test_find_data_sheet_skips_unreadable_sheets() {
        let source = SheetedSource {
            sheets: vec![
                named("Summary", &["Total", "Week"]),
                named("Broken", &["FeedbackStatus", "ErrorCodeV4Id", "CustomerNumber"]),
                named("Export", &["Customer ID", "Status", "Error Code"]),
                named("data", &["a", "b"]),
            ],
            broken: vec!["Broken"],
        };
        let config = SchemaConfig::default();
        let extractor = RecordExtractor::new(&source, SchemaResolver::new(&config));

        let sheet = extractor.find_data_sheet(Path::new("weekly.xlsx")).unwrap();
        assert_eq!(sheet, "Export");
    }

    #[test]
    fn test_find_data_sheet_fails_when_only_unreadable_sheets_match() {
        let source = SheetedSource {
            sheets: vec![
                named("Broken", &["FeedbackStatus", "ErrorCodeV4Id", "CustomerNumber"]),
                named("Summary", &["Total"]),
            ],
            broken: vec!["Broken"],
        };
        let config = SchemaConfig::default();
        let extractor = RecordExtractor::new(&source, SchemaResolver::new(&config));

        let err = extractor.find_data_sheet(Path::new("weekly.xlsx")).unwrap_err();
        assert!(matches!(err, ReconError::NoDataSheet(ref p) if p == "weekly.xlsx"));
    }
}
