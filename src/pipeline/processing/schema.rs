//! Column identification across exports whose headers drift.
//!
//! Headers are normalized (lower-cased, punctuation and spacing stripped) and
//! matched against canonical field names first, then against a keyword
//! dictionary. The first header in column order that contains a keyword wins;
//! there is no scoring, so the outcome only depends on header order.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::RangeInclusive;

use tracing::debug;

use crate::config::SchemaConfig;
use crate::constants;
use crate::error::{ReconError, Result};

/// Canonical semantic fields a source column can be resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    CustomerNumber,
    FundIdentity,
    FundTax,
    EmployeeId,
    FeedbackStatus,
    ErrorCode,
    ErrorDescription,
    UpdateDate,
    StatusLastUpdateDate,
    DefaultResponsibility,
    HasOverrideCondition,
    OverrideResponsibility,
}

impl Field {
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Field::CustomerNumber => "CustomerNumber",
            Field::FundIdentity => "KodKupa_IdentityNumber",
            Field::FundTax => "KodKupa_IncomeTax",
            Field::EmployeeId => "MISPAR_MEZAHE_OVED",
            Field::FeedbackStatus => "FeedbackStatus",
            Field::ErrorCode => "ErrorCodeV4Id",
            Field::ErrorDescription => "ErrorCodeV4Description",
            Field::UpdateDate => "UpdateDate",
            Field::StatusLastUpdateDate => "StatusLastUpdateDate",
            Field::DefaultResponsibility => "DefaultResponsibility",
            Field::HasOverrideCondition => "HasOverrideCondition",
            Field::OverrideResponsibility => "OverrideResponsibility",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// Fields every feedback extract must provide
pub const FEEDBACK_REQUIRED: &[Field] = &[
    Field::CustomerNumber,
    Field::FundIdentity,
    Field::FundTax,
    Field::EmployeeId,
    Field::FeedbackStatus,
    Field::ErrorCode,
];

/// Fields whose joint presence identifies the data sheet of a workbook
pub const DATA_SHEET_PROBE: &[Field] = &[
    Field::FeedbackStatus,
    Field::ErrorCode,
    Field::CustomerNumber,
];

pub const MAPPING_REQUIRED: &[Field] = &[Field::ErrorCode, Field::DefaultResponsibility];

pub const MAPPING_OPTIONAL: &[Field] = &[
    Field::HasOverrideCondition,
    Field::OverrideResponsibility,
];

/// Canonical field -> original column label for one loaded source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaMap {
    columns: BTreeMap<Field, String>,
}

impl SchemaMap {
    pub fn get(&self, field: Field) -> Option<&str> {
        self.columns.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.columns.contains_key(&field)
    }

    pub fn insert(&mut self, field: Field, column: impl Into<String>) {
        self.columns.insert(field, column.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.columns.iter().map(|(f, c)| (*f, c.as_str()))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Use the secondary status timestamp wherever `UpdateDate` would be read
    /// when only the secondary column resolved.
    pub fn apply_update_date_fallback(&mut self) {
        if !self.contains(Field::UpdateDate) {
            if let Some(secondary) = self.columns.get(&Field::StatusLastUpdateDate).cloned() {
                debug!("UpdateDate not found, using StatusLastUpdateDate column '{}'", secondary);
                self.columns.insert(Field::UpdateDate, secondary);
            }
        }
    }
}

/// Lower-case and keep only ASCII digits/letters and the working alphabet
pub fn normalize_header(header: &str, alphabet: &RangeInclusive<char>) -> String {
    header
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_digit() || c.is_ascii_lowercase() || alphabet.contains(c))
        .collect()
}

/// Resolves table headers into [`SchemaMap`]s using the configured dictionary
pub struct SchemaResolver<'a> {
    config: &'a SchemaConfig,
    alphabet: RangeInclusive<char>,
}

/// Normalized headers in column order, paired with their original label
struct HeaderIndex {
    entries: Vec<(String, String)>,
}

impl HeaderIndex {
    fn exact(&self, normalized: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(norm, _)| norm == normalized)
            .map(|(_, orig)| orig.as_str())
    }

    fn describe(&self) -> String {
        self.entries
            .iter()
            .map(|(norm, orig)| format!("{} ({})", orig, norm))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl<'a> SchemaResolver<'a> {
    pub fn new(config: &'a SchemaConfig) -> Self {
        let (start, end) = config.alphabet;
        Self {
            config,
            alphabet: start..=end,
        }
    }

    pub fn normalize(&self, header: &str) -> String {
        normalize_header(header, &self.alphabet)
    }

    fn index(&self, headers: &[String]) -> HeaderIndex {
        let mut entries: Vec<(String, String)> = Vec::with_capacity(headers.len());
        let mut positions: HashMap<String, usize> = HashMap::new();
        for header in headers {
            let normalized = self.normalize(header);
            match positions.get(&normalized) {
                // A later duplicate replaces the label but keeps the first slot
                Some(&pos) => entries[pos].1 = header.clone(),
                None => {
                    positions.insert(normalized.clone(), entries.len());
                    entries.push((normalized, header.clone()));
                }
            }
        }
        HeaderIndex { entries }
    }

    fn find_in_index(&self, field: Field, index: &HeaderIndex) -> Option<String> {
        let canonical = self.normalize(field.canonical_name());
        if let Some(original) = index.exact(&canonical) {
            return Some(original.to_string());
        }

        let keywords = self.config.keywords_for(field.canonical_name());
        index
            .entries
            .iter()
            .find(|(norm, _)| {
                keywords
                    .iter()
                    .any(|kw| !kw.is_empty() && norm.contains(kw.as_str()))
            })
            .map(|(_, orig)| orig.clone())
    }

    /// Column label for a single field, if any header matches
    pub fn find_column(&self, field: Field, headers: &[String]) -> Option<String> {
        self.find_in_index(field, &self.index(headers))
    }

    /// Resolve required and optional fields for one source.
    ///
    /// Fails on the first required field without a match, listing every
    /// header as `original (normalized)`.
    pub fn resolve(
        &self,
        headers: &[String],
        required: &[Field],
        optional: &[Field],
        source_name: &str,
    ) -> Result<SchemaMap> {
        let index = self.index(headers);
        let mut map = SchemaMap::default();

        for &field in required {
            match self.find_in_index(field, &index) {
                Some(column) => map.insert(field, column),
                None => {
                    return Err(ReconError::MissingColumn {
                        field: field.canonical_name().to_string(),
                        source_name: source_name.to_string(),
                        available: index.describe(),
                    })
                }
            }
        }

        for &field in optional {
            if map.contains(field) {
                continue;
            }
            if let Some(column) = self.find_in_index(field, &index) {
                map.insert(field, column);
            }
        }

        log_shared_columns(&map, source_name);
        Ok(map)
    }

    /// Schema of a weekly or historical feedback extract.
    ///
    /// `UpdateDate` may be satisfied by `StatusLastUpdateDate`; one of the two
    /// has to be present.
    pub fn resolve_feedback(
        &self,
        headers: &[String],
        with_description: bool,
        source_name: &str,
    ) -> Result<SchemaMap> {
        let mut optional = vec![Field::UpdateDate, Field::StatusLastUpdateDate];
        if with_description {
            optional.push(Field::ErrorDescription);
        }

        let mut map = self.resolve(headers, FEEDBACK_REQUIRED, &optional, source_name)?;
        map.apply_update_date_fallback();

        if !map.contains(Field::UpdateDate) {
            return Err(ReconError::MissingColumn {
                field: Field::UpdateDate.canonical_name().to_string(),
                source_name: source_name.to_string(),
                available: self.index(headers).describe(),
            });
        }

        for (field, column) in map.iter() {
            debug!(source = source_name, "  {}: {}", field, column);
        }
        Ok(map)
    }

    /// Whether a header row looks like a feedback data sheet
    pub fn is_data_sheet(&self, headers: &[String]) -> bool {
        let index = self.index(headers);
        DATA_SHEET_PROBE
            .iter()
            .all(|field| self.find_in_index(*field, &index).is_some())
    }

    /// Pick the data sheet among `(sheet name, header row)` candidates.
    ///
    /// Prefers the first sheet whose headers pass [`Self::is_data_sheet`], then a
    /// sheet literally named `data`.
    pub fn select_data_sheet<'s>(&self, sheets: &'s [(String, Vec<String>)]) -> Option<&'s str> {
        sheets
            .iter()
            .find(|(_, headers)| self.is_data_sheet(headers))
            .or_else(|| {
                sheets
                    .iter()
                    .find(|(name, _)| name.trim().to_lowercase() == constants::FALLBACK_DATA_SHEET)
            })
            .map(|(name, _)| name.as_str())
    }
}

fn log_shared_columns(map: &SchemaMap, source_name: &str) {
    let mut by_column: BTreeMap<&str, Vec<Field>> = BTreeMap::new();
    for (field, column) in map.iter() {
        by_column.entry(column).or_default().push(field);
    }
    for (column, fields) in by_column.iter().filter(|(_, f)| f.len() > 1) {
        debug!(
            source = source_name,
            "column '{}' satisfies several fields: {:?}", column, fields
        );
    }
}
