use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;

/// A single spreadsheet cell, independent of the file format it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(NaiveDateTime),
}

/// Timestamp layouts seen in feedback exports, tried in order.
/// Slash and dot dates are day-first.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d.%m.%Y", "%Y/%m/%d", "%d-%m-%Y"];

/// Parse a free-text timestamp. Anything unrecognized yields `None`.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl CellValue {
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Canonical text used for identity comparisons.
    ///
    /// Integral numbers drop their fractional part so `123.0` and `"123"`
    /// compare equal; blank cells have no key text at all.
    pub fn as_key_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            CellValue::Int(i) => Some(i.to_string()),
            CellValue::Float(f) => {
                if !f.is_finite() {
                    None
                } else if f.fract() == 0.0 {
                    Some(format!("{:.0}", f))
                } else {
                    Some(f.to_string())
                }
            }
            CellValue::Bool(b) => Some(b.to_string()),
            CellValue::DateTime(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }

    /// Plain rendering of the cell, empty string for blanks
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            other => other.as_key_text().unwrap_or_default(),
        }
    }

    /// Integer error code, `None` when absent or not an integer
    pub fn as_error_code(&self) -> Option<i64> {
        match self {
            CellValue::Int(i) => Some(*i),
            CellValue::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
            CellValue::Text(s) => {
                let trimmed = s.trim();
                trimmed.parse::<i64>().ok().or_else(|| {
                    trimmed
                        .parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite() && f.fract() == 0.0)
                        .map(|f| f as i64)
                })
            }
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            CellValue::DateTime(dt) => Some(*dt),
            CellValue::Text(s) => parse_timestamp(s),
            _ => None,
        }
    }

    /// Loose boolean reading for flag columns (`TRUE`, `1`, `yes`, `כן`)
    pub fn as_flag(&self) -> bool {
        match self {
            CellValue::Bool(b) => *b,
            CellValue::Int(i) => *i != 0,
            CellValue::Float(f) => *f != 0.0 && !f.is_nan(),
            CellValue::Text(s) => matches!(
                s.trim().to_lowercase().as_str(),
                "true" | "1" | "yes" | "y" | "t" | "כן"
            ),
            _ => false,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<Option<String>> for CellValue {
    fn from(value: Option<String>) -> Self {
        value.map(CellValue::Text).unwrap_or(CellValue::Empty)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Int(value)
    }
}

impl From<u32> for CellValue {
    fn from(value: u32) -> Self {
        CellValue::Int(i64::from(value))
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(value: NaiveDateTime) -> Self {
        CellValue::DateTime(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

/// A named rectangular table: one header row plus data rows
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Table {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    /// Cell at `(row, col)`; short rows read as empty
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&CellValue::Empty)
    }

    pub fn push_row(&mut self, row: Vec<CellValue>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integral_numbers_share_key_text_with_strings() {
        assert_eq!(CellValue::Float(123.0).as_key_text(), Some("123".to_string()));
        assert_eq!(CellValue::Text(" 123 ".into()).as_key_text(), Some("123".to_string()));
        assert_eq!(CellValue::Int(123).as_key_text(), Some("123".to_string()));
        assert_eq!(CellValue::Text("   ".into()).as_key_text(), None);
        assert_eq!(CellValue::Empty.as_key_text(), None);
    }

    #[test]
    fn test_error_code_parsing() {
        assert_eq!(CellValue::Float(15.0).as_error_code(), Some(15));
        assert_eq!(CellValue::Text("93".into()).as_error_code(), Some(93));
        assert_eq!(CellValue::Text("4.0".into()).as_error_code(), Some(4));
        assert_eq!(CellValue::Text("n/a".into()).as_error_code(), None);
        assert_eq!(CellValue::Float(4.5).as_error_code(), None);
        assert_eq!(CellValue::Empty.as_error_code(), None);
    }

    #[test]
    fn test_timestamp_parsing() {
        let expected = NaiveDate::from_ymd_opt(2025, 12, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2025-12-01"), Some(expected));
        assert_eq!(parse_timestamp("01/12/2025"), Some(expected));
        assert_eq!(parse_timestamp("01.12.2025"), Some(expected));
        assert_eq!(
            parse_timestamp("2025-12-01 08:30:00"),
            expected.date().and_hms_opt(8, 30, 0)
        );
        assert_eq!(parse_timestamp("not a date"), None);
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(CellValue::Float(45992.0).as_timestamp(), None);
    }

    #[test]
    fn test_flag_parsing() {
        assert!(CellValue::Bool(true).as_flag());
        assert!(CellValue::Text("TRUE".into()).as_flag());
        assert!(CellValue::Int(1).as_flag());
        assert!(!CellValue::Text("false".into()).as_flag());
        assert!(!CellValue::Empty.as_flag());
    }

    #[test]
    fn test_short_rows_read_as_empty() {
        let mut table = Table::new("t", vec!["a".into(), "b".into()]);
        table.push_row(vec![CellValue::from("x")]);
        assert_eq!(table.cell(0, 1), &CellValue::Empty);
        assert_eq!(table.cell(5, 0), &CellValue::Empty);
    }
}
