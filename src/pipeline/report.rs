//! Output tables of a run, in the column layout downstream mail merges expect.

use crate::app::ports::PivotLayout;
use crate::constants::*;
use crate::domain::{CellValue, ClassifiedRecord, DurationBucket, IssueRecord, SummaryKey, Table};
use crate::pipeline::processing::aggregate::Aggregation;

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

const KEY_COLUMNS: [&str; 5] = [
    COL_CUSTOMER_NUMBER,
    COL_FUND_IDENTITY,
    COL_FUND_TAX,
    COL_ERROR_CODE,
    COL_RESPONSIBILITY,
];

fn key_cells(key: &SummaryKey) -> Vec<CellValue> {
    vec![
        key.customer_number.clone().into(),
        key.fund_identity.clone().into(),
        key.fund_tax.clone().into(),
        key.error_code.into(),
        key.responsibility.clone().into(),
    ]
}

pub fn detail_table(records: &[ClassifiedRecord]) -> Table {
    let mut table = Table::new(
        DRAFTS_SHEET,
        headers(&[
            COL_CUSTOMER_NUMBER,
            COL_EMPLOYEE_ID,
            COL_KUPA_ID,
            COL_FUND_IDENTITY,
            COL_FUND_TAX,
            COL_ERROR_CODE,
            COL_ERROR_DESCRIPTION,
            COL_UPDATE_DATE,
            COL_DURATION_WEEKS,
            COL_RESPONSIBILITY,
            COL_OVERRIDE_TRIGGERED,
            COL_ORIGINAL_STATUS,
        ]),
    );
    for r in records {
        table.push_row(vec![
            r.customer_number.clone().into(),
            r.employee_id.clone().into(),
            r.kupa_id().into(),
            r.fund_identity.clone().into(),
            r.fund_tax.clone().into(),
            r.error_code.into(),
            r.error_description.clone().into(),
            r.update_date.clone(),
            r.duration_weeks.into(),
            r.responsibility.clone().into(),
            r.override_triggered.into(),
            r.original_status.clone().into(),
        ]);
    }
    table
}

/// Long form, one row per (key, bucket); source of the native pivot
pub fn pivot_source_table(aggregation: &Aggregation) -> Table {
    let mut columns = KEY_COLUMNS.to_vec();
    columns.extend([COL_DURATION_BUCKET, COL_UNIQUE_EMPLOYEES]);
    let mut table = Table::new(PIVOT_SOURCE_SHEET, headers(&columns));

    for group in &aggregation.groups {
        let mut row = key_cells(&group.key);
        row.push(group.bucket.label().into());
        row.push((group.unique_employees as i64).into());
        table.push_row(row);
    }
    table
}

/// Wide form with exactly one column per duration bucket
pub fn summary_table(aggregation: &Aggregation) -> Table {
    let mut columns = KEY_COLUMNS.to_vec();
    columns.extend(DurationBucket::ALL.iter().map(|b| b.label()));
    let mut table = Table::new(PIVOT_SHEET, headers(&columns));

    for summary in &aggregation.summary {
        let mut row = key_cells(&summary.key);
        row.extend(summary.counts.iter().map(|c| CellValue::Int(*c as i64)));
        table.push_row(row);
    }
    table
}

pub fn issues_table(issues: &[IssueRecord]) -> Table {
    let mut table = Table::new(
        ISSUES_SHEET,
        headers(&[
            COL_ISSUE_TYPE,
            COL_CUSTOMER_NUMBER,
            COL_FUND_IDENTITY,
            COL_FUND_TAX,
            COL_EMPLOYEE_ID,
            COL_ERROR_CODE,
            COL_FEEDBACK_STATUS,
        ]),
    );
    for issue in issues {
        table.push_row(vec![
            issue.issue_type.clone().into(),
            issue.customer_number.clone().into(),
            issue.fund_identity.clone().into(),
            issue.fund_tax.clone().into(),
            issue.employee_id.clone().into(),
            issue.error_code.into(),
            issue.feedback_status.clone().into(),
        ]);
    }
    table
}

/// Row fields are the grouping key, buckets across, employee counts summed
pub fn pivot_layout() -> PivotLayout {
    PivotLayout {
        source_sheet: PIVOT_SOURCE_SHEET.to_string(),
        target_sheet: PIVOT_SHEET.to_string(),
        row_fields: KEY_COLUMNS.iter().map(|c| c.to_string()).collect(),
        column_field: COL_DURATION_BUCKET.to_string(),
        value_field: COL_UNIQUE_EMPLOYEES.to_string(),
    }
}
