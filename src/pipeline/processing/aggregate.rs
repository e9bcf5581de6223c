use std::collections::{BTreeMap, HashSet};

use crate::domain::{ClassifiedRecord, DurationBucket, PivotSourceRow, SummaryKey, SummaryRow};

/// Grouped view of a run's classified records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    /// Long form: one row per (key, bucket) that has records
    pub groups: Vec<PivotSourceRow>,
    /// Wide form: one row per key, every bucket present
    pub summary: Vec<SummaryRow>,
}

fn summary_key(record: &ClassifiedRecord) -> SummaryKey {
    SummaryKey {
        customer_number: record.customer_number.clone().unwrap_or_default(),
        fund_identity: record.fund_identity.clone().unwrap_or_default(),
        fund_tax: record.fund_tax.clone().unwrap_or_default(),
        error_code: record.error_code,
        responsibility: record.responsibility.clone(),
    }
}

/// Count distinct employees per grouping key and duration bucket.
///
/// Blank employee identifiers are not counted, but their group still shows up
/// (with zero) so no record silently disappears from the summary.
pub fn aggregate(records: &[ClassifiedRecord]) -> Aggregation {
    let mut grouped: BTreeMap<(SummaryKey, DurationBucket), HashSet<&str>> = BTreeMap::new();
    for record in records {
        let bucket = DurationBucket::from_weeks(record.duration_weeks);
        let employees = grouped.entry((summary_key(record), bucket)).or_default();
        if let Some(employee) = record.employee_id.as_deref() {
            employees.insert(employee);
        }
    }

    let mut wide: BTreeMap<SummaryKey, [usize; 5]> = BTreeMap::new();
    let groups: Vec<PivotSourceRow> = grouped
        .into_iter()
        .map(|((key, bucket), employees)| {
            wide.entry(key.clone()).or_insert([0; 5])[bucket.index()] = employees.len();
            PivotSourceRow {
                key,
                bucket,
                unique_employees: employees.len(),
            }
        })
        .collect();

    let summary: Vec<SummaryRow> = wide
        .into_iter()
        .map(|(key, counts)| SummaryRow { key, counts })
        .collect();

    Aggregation { groups, summary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CellValue;

    fn classified(customer: &str, employee: Option<&str>, code: i64, weeks: u32) -> ClassifiedRecord {
        ClassifiedRecord {
            customer_number: Some(customer.into()),
            employee_id: employee.map(String::from),
            fund_identity: Some("510".into()),
            fund_tax: Some("77".into()),
            error_code: code,
            error_description: None,
            update_date: CellValue::Empty,
            duration_weeks: weeks,
            responsibility: "Employer".into(),
            override_triggered: false,
            original_status: String::new(),
        }
    }

    #[test]
    fn test_duplicate_employees_in_bucket_count_once() {
        let records = vec![
            classified("1", Some("300"), 4, 1),
            classified("1", Some("300"), 4, 1),
            classified("1", Some("301"), 4, 1),
        ];
        let agg = aggregate(&records);
        assert_eq!(agg.groups.len(), 1);
        assert_eq!(agg.groups[0].unique_employees, 2);
        assert_eq!(agg.summary[0].counts, [2, 0, 0, 0, 0]);
    }

    #[test]
    fn test_long_durations_share_the_last_bucket() {
        let records = vec![
            classified("1", Some("300"), 4, 5),
            classified("1", Some("301"), 4, 9),
            classified("1", Some("302"), 4, 3),
        ];
        let agg = aggregate(&records);
        assert_eq!(agg.summary.len(), 1);
        assert_eq!(agg.summary[0].counts, [0, 0, 1, 0, 2]);
        assert_eq!(agg.groups.len(), 2);
    }

    #[test]
    fn test_distinct_counts_never_exceed_records_in_bucket() {
        let records: Vec<_> = (0..30)
            .map(|i| {
                classified(
                    if i % 2 == 0 { "1" } else { "2" },
                    Some(["a", "b", "c"][i % 3]),
                    4,
                    (i % 7) as u32 + 1,
                )
            })
            .collect();
        let agg = aggregate(&records);
        for group in &agg.groups {
            let in_bucket = records
                .iter()
                .filter(|r| {
                    r.customer_number.as_deref() == Some(group.key.customer_number.as_str())
                        && DurationBucket::from_weeks(r.duration_weeks) == group.bucket
                })
                .count();
            assert!(group.unique_employees <= in_bucket);
        }
        for row in &agg.summary {
            assert_eq!(row.counts.len(), 5);
        }
    }

    #[test]
    fn test_groups_sorted_by_key_and_blank_parts_kept() {
        let mut blank = classified("", None, 4, 1);
        blank.customer_number = None;
        let records = vec![
            classified("2", Some("300"), 4, 1),
            classified("1", Some("300"), 5, 2),
            classified("1", Some("300"), 4, 1),
            blank,
        ];
        let agg = aggregate(&records);
        let keys: Vec<_> = agg
            .summary
            .iter()
            .map(|r| (r.key.customer_number.as_str(), r.key.error_code))
            .collect();
        assert_eq!(keys, vec![("", 4), ("1", 4), ("1", 5), ("2", 4)]);
        assert_eq!(agg.summary[0].counts, [0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_empty_input_yields_empty_aggregation() {
        assert_eq!(aggregate(&[]), Aggregation::default());
    }
}
