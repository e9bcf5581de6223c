//! Record shapes shared by the reconciliation stages.

pub mod table;

use chrono::NaiveDateTime;
use serde::Serialize;

pub use table::{parse_timestamp, CellValue, Table};

/// One row of the weekly or historical feedback extract.
///
/// Weekly and historical rows have the same shape so a single type covers
/// both; identity parts are `None` when the cell was blank.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackRecord {
    pub customer_number: Option<String>,
    pub fund_identity: Option<String>,
    pub fund_tax: Option<String>,
    pub employee_id: Option<String>,
    /// Status text as found in the extract
    pub status: String,
    pub error_code: Option<i64>,
    pub error_description: Option<String>,
    /// Parsed update timestamp; unparsable cells are `None`
    pub update_date: Option<NaiveDateTime>,
    /// The update cell exactly as read, kept for the detail output
    pub update_date_raw: CellValue,
}

/// (customer, fund identity, fund tax code, employee): the override lookup key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EmployeeFundKey {
    pub customer_number: String,
    pub fund_identity: String,
    pub fund_tax: String,
    pub employee_id: String,
}

/// Full identity key: employee/fund plus the error class.
///
/// `error_code` is `None` for both absent and zero codes, which therefore
/// match each other and nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub employee_fund: EmployeeFundKey,
    pub error_code: Option<i64>,
}

impl FeedbackRecord {
    /// `None` when any part is blank, so blank parts never correlate
    pub fn employee_fund_key(&self) -> Option<EmployeeFundKey> {
        Some(EmployeeFundKey {
            customer_number: self.customer_number.clone()?,
            fund_identity: self.fund_identity.clone()?,
            fund_tax: self.fund_tax.clone()?,
            employee_id: self.employee_id.clone()?,
        })
    }

    pub fn identity_key(&self) -> Option<IdentityKey> {
        Some(IdentityKey {
            employee_fund: self.employee_fund_key()?,
            error_code: self.error_class(),
        })
    }

    /// Error code with zero folded into "no error"
    pub fn error_class(&self) -> Option<i64> {
        self.error_code.filter(|code| *code != 0)
    }

    pub fn has_no_error(&self) -> bool {
        self.error_class().is_none()
    }
}

/// Per-error-code responsibility configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingRule {
    pub error_code: i64,
    pub default_responsibility: String,
    pub has_override: bool,
    pub override_responsibility: Option<String>,
}

/// A weekly record after duration and responsibility have been decided
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedRecord {
    pub customer_number: Option<String>,
    pub employee_id: Option<String>,
    pub fund_identity: Option<String>,
    pub fund_tax: Option<String>,
    pub error_code: i64,
    pub error_description: Option<String>,
    pub update_date: CellValue,
    pub duration_weeks: u32,
    pub responsibility: String,
    pub override_triggered: bool,
    pub original_status: String,
}

impl ClassifiedRecord {
    /// `<fund identity>-<fund tax code>`, blanks rendered empty
    pub fn kupa_id(&self) -> String {
        format!(
            "{}-{}",
            self.fund_identity.as_deref().unwrap_or(""),
            self.fund_tax.as_deref().unwrap_or("")
        )
    }
}

/// Diagnostic for a weekly record whose error code has no mapping rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueRecord {
    pub issue_type: String,
    pub customer_number: Option<String>,
    pub fund_identity: Option<String>,
    pub fund_tax: Option<String>,
    pub employee_id: Option<String>,
    pub error_code: i64,
    pub feedback_status: String,
}

/// Clamped duration: 1 through 4 weeks, or five and more
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DurationBucket {
    One,
    Two,
    Three,
    Four,
    FiveOrMore,
}

impl DurationBucket {
    pub const ALL: [DurationBucket; 5] = [
        DurationBucket::One,
        DurationBucket::Two,
        DurationBucket::Three,
        DurationBucket::Four,
        DurationBucket::FiveOrMore,
    ];

    pub fn from_weeks(weeks: u32) -> Self {
        match weeks {
            0 | 1 => DurationBucket::One,
            2 => DurationBucket::Two,
            3 => DurationBucket::Three,
            4 => DurationBucket::Four,
            _ => DurationBucket::FiveOrMore,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DurationBucket::One => "DurationWeeks = 1",
            DurationBucket::Two => "DurationWeeks = 2",
            DurationBucket::Three => "DurationWeeks = 3",
            DurationBucket::Four => "DurationWeeks = 4",
            DurationBucket::FiveOrMore => "DurationWeeks >= 5",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// Grouping key of the summary matrix
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SummaryKey {
    pub customer_number: String,
    pub fund_identity: String,
    pub fund_tax: String,
    pub error_code: i64,
    pub responsibility: String,
}

/// One row of the wide summary: distinct employees per duration bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub key: SummaryKey,
    pub counts: [usize; 5],
}

/// One row of the long-form pivot source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotSourceRow {
    pub key: SummaryKey,
    pub bucket: DurationBucket,
    pub unique_employees: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(customer: Option<&str>, code: Option<i64>) -> FeedbackRecord {
        FeedbackRecord {
            customer_number: customer.map(String::from),
            fund_identity: Some("510".into()),
            fund_tax: Some("9".into()),
            employee_id: Some("300".into()),
            status: String::new(),
            error_code: code,
            error_description: None,
            update_date: None,
            update_date_raw: CellValue::Empty,
        }
    }

    #[test]
    fn test_blank_identity_part_has_no_key() {
        assert!(record(None, Some(4)).identity_key().is_none());
        assert!(record(None, Some(4)).employee_fund_key().is_none());
        assert!(record(Some("1"), Some(4)).identity_key().is_some());
    }

    #[test]
    fn test_zero_and_absent_error_codes_share_a_class() {
        assert_eq!(
            record(Some("1"), Some(0)).identity_key(),
            record(Some("1"), None).identity_key()
        );
        assert_ne!(
            record(Some("1"), Some(0)).identity_key(),
            record(Some("1"), Some(4)).identity_key()
        );
    }

    #[test]
    fn test_duration_bucket_clamps() {
        assert_eq!(DurationBucket::from_weeks(1), DurationBucket::One);
        assert_eq!(DurationBucket::from_weeks(4), DurationBucket::Four);
        assert_eq!(DurationBucket::from_weeks(5), DurationBucket::FiveOrMore);
        assert_eq!(DurationBucket::from_weeks(40), DurationBucket::FiveOrMore);
        assert_eq!(DurationBucket::FiveOrMore.index(), 4);
    }
}
