use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use feedback_recon::app::{ReconcileUseCase, RunInputs};
use feedback_recon::config::{OutputFormat, ReconConfig};
use feedback_recon::infra;
use serde_json::Value;
use tempfile::tempdir;

const ACTIONABLE: &str = "רשומה הועברה לטיפול מעסיק";
const INGESTED: &str = "רשומה נקלטה";

const WEEKLY_HEADER: &str = "Customer Number,KodKupa_IdentityNumber,KodKupa_IncomeTax,MISPAR MEZAHE OVED,Feedback Status,ErrorCodeV4Id,ErrorCodeV4Description,Status Last Update Date";
const HISTORY_HEADER: &str = "CustomerNumber,KodKupa_IdentityNumber,KodKupa_IncomeTax,MISPAR_MEZAHE_OVED,FeedbackStatus,ErrorCodeV4Id,UpdateDate";

fn write(dir: &Path, name: &str, header: &str, rows: &[String]) -> PathBuf {
    let path = dir.join(name);
    let mut content = format!("{header}\n");
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    fs::write(&path, content).unwrap();
    path
}

fn weekly_row(employee: &str, status: &str, code: &str, date: &str) -> String {
    format!("1001,510,77,{employee},{status},{code},desc {code},{date}")
}

fn history_row(employee: &str, status: &str, code: &str, date: &str) -> String {
    format!("1001,510,77,{employee},{status},{code},{date}")
}

fn mapping(dir: &Path) -> PathBuf {
    write(
        dir,
        "mapping.csv",
        "ErrorCodeV4Id,DefaultResponsibility,HasOverrideCondition,OverrideResponsibility",
        &["4,Employer,TRUE,Producer".to_string(), "7,Producer,FALSE,".to_string()],
    )
}

fn history(dir: &Path) -> PathBuf {
    write(
        dir,
        "history.csv",
        HISTORY_HEADER,
        &[
            history_row("300", ACTIONABLE, "4", "2025-12-15"),
            history_row("300", ACTIONABLE, "4", "2025-12-08"),
            // 2025-12-01 is missing, so this one is outside the chain
            history_row("300", ACTIONABLE, "4", "2025-11-24"),
            history_row("300", INGESTED, "", "2025-10-01"),
        ],
    )
}

fn use_case(format: OutputFormat) -> ReconcileUseCase {
    ReconcileUseCase::new(
        Box::new(infra::WorkbookSource::new()),
        infra::table_sink(format),
        None,
        ReconConfig::default(),
    )
}

fn sheet<'a>(artifact: &'a Value, name: &str) -> &'a Value {
    artifact["sheets"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["name"] == name)
        .unwrap_or_else(|| panic!("sheet {name} missing"))
}

fn column(sheet: &Value, header: &str) -> usize {
    sheet["headers"]
        .as_array()
        .unwrap()
        .iter()
        .position(|h| h == header)
        .unwrap_or_else(|| panic!("column {header} missing"))
}

#[test]
fn test_full_run_classifies_filters_and_reports() -> Result<()> {
    let dir = tempdir()?;
    let weekly = write(
        dir.path(),
        "weekly.csv",
        WEEKLY_HEADER,
        &[
            weekly_row("300", ACTIONABLE, "4", "2025-12-22"),
            weekly_row("301", ACTIONABLE, "7", "2025-12-20"),
            weekly_row("302", ACTIONABLE, "42", "2025-12-19"),
            weekly_row("303", INGESTED, "4", "2025-12-22"),
            weekly_row("304", ACTIONABLE, "4", "2025-12-01"),
            weekly_row("305", ACTIONABLE, "1", "2025-12-21"),
        ],
    );
    let inputs = RunInputs {
        weekly,
        history: history(dir.path()),
        mapping: mapping(dir.path()),
    };
    let output = dir.path().join("out").join("results.json");

    let report = use_case(OutputFormat::Json).run(&inputs, &output)?;

    assert!(report.ok);
    assert_eq!(report.output.as_deref(), Some(output.as_path()));
    assert_eq!(report.counts.weekly_loaded, 6);
    assert_eq!(report.counts.history_loaded, 4);
    assert_eq!(report.counts.mapping_rules, 2);
    assert_eq!(report.counts.filtered, 4);
    assert_eq!(report.counts.classified, 3);
    assert_eq!(report.counts.skipped, 1);
    assert_eq!(report.counts.issues, 1);
    assert_eq!(report.counts.overrides_triggered, 1);

    let artifact: Value = serde_json::from_str(&fs::read_to_string(&output)?)?;
    let names: Vec<_> = artifact["sheets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Drafts", "PIVOT_SOURCE", "PIVOT", "Processing Issues"]);

    let drafts = sheet(&artifact, "Drafts");
    let rows = drafts["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 3);
    let employee = column(drafts, "EmployeeID");
    let weeks = column(drafts, "DurationWeeks");
    let responsibility = column(drafts, "Responsibility");
    let triggered = column(drafts, "OverrideTriggered");
    let kupa = column(drafts, "KupaID");

    assert_eq!(rows[0][employee], "300");
    assert_eq!(rows[0][weeks], 3);
    assert_eq!(rows[0][responsibility], "Producer");
    assert_eq!(rows[0][triggered], true);
    assert_eq!(rows[0][kupa], "510-77");

    assert_eq!(rows[1][employee], "301");
    assert_eq!(rows[1][weeks], 1);
    assert_eq!(rows[1][responsibility], "Producer");
    assert_eq!(rows[1][triggered], false);

    assert_eq!(rows[2][employee], "302");
    assert_eq!(rows[2][responsibility], "Unknown");

    let pivot = sheet(&artifact, "PIVOT");
    let summary = pivot["rows"].as_array().unwrap();
    assert_eq!(summary.len(), 3);
    assert_eq!(pivot["headers"].as_array().unwrap().len(), 10);
    let code = column(pivot, "ErrorCode");
    let three = column(pivot, "DurationWeeks = 3");
    let first = summary.iter().find(|r| r[code] == 4).unwrap();
    assert_eq!(first[three], 1);

    let issues = sheet(&artifact, "Processing Issues");
    let issue_rows = issues["rows"].as_array().unwrap();
    assert_eq!(issue_rows.len(), 1);
    assert_eq!(issue_rows[0][column(issues, "IssueType")], "MissingErrorMapping");
    assert_eq!(issue_rows[0][column(issues, "ErrorCode")], 42);
    Ok(())
}

#[test]
fn test_nothing_actionable_writes_no_artifact() -> Result<()> {
    let dir = tempdir()?;
    let weekly = write(
        dir.path(),
        "weekly.csv",
        WEEKLY_HEADER,
        &[weekly_row("300", INGESTED, "4", "2025-12-22")],
    );
    let inputs = RunInputs {
        weekly,
        history: history(dir.path()),
        mapping: mapping(dir.path()),
    };
    let output = dir.path().join("results.json");

    let report = use_case(OutputFormat::Json).run(&inputs, &output)?;

    assert!(report.ok);
    assert_eq!(report.message, "No records require handling after filtering.");
    assert!(report.output.is_none());
    assert!(!output.exists());
    Ok(())
}

#[test]
fn test_missing_column_names_field_and_headers() -> Result<()> {
    let dir = tempdir()?;
    // Named `data` so the sheet is picked even though its headers are incomplete
    let weekly = write(
        dir.path(),
        "data.csv",
        "CustomerNumber,KodKupa_IdentityNumber,KodKupa_IncomeTax,MISPAR_MEZAHE_OVED,FeedbackStatus,UpdateDate",
        &[format!("1001,510,77,300,{ACTIONABLE},2025-12-22")],
    );
    let inputs = RunInputs {
        weekly,
        history: history(dir.path()),
        mapping: mapping(dir.path()),
    };
    let output = dir.path().join("results.json");

    let err = use_case(OutputFormat::Json).run(&inputs, &output).unwrap_err();
    let message = err.to_string();

    assert!(message.contains("Missing column 'ErrorCodeV4Id' in Weekly"));
    assert!(message.contains("FeedbackStatus (feedbackstatus)"));
    assert!(!output.exists());
    Ok(())
}

#[test]
fn test_csv_format_writes_one_file_per_sheet() -> Result<()> {
    let dir = tempdir()?;
    let weekly = write(
        dir.path(),
        "weekly.csv",
        WEEKLY_HEADER,
        &[weekly_row("300", ACTIONABLE, "4", "2025-12-22")],
    );
    let inputs = RunInputs {
        weekly,
        history: history(dir.path()),
        mapping: mapping(dir.path()),
    };
    let output = dir.path().join("results");

    use_case(OutputFormat::Csv).run(&inputs, &output)?;

    for file in ["Drafts.csv", "PIVOT_SOURCE.csv", "PIVOT.csv", "Processing_Issues.csv"] {
        assert!(output.join(file).exists(), "{file} not written");
    }
    let pivot_source = fs::read_to_string(output.join("PIVOT_SOURCE.csv"))?;
    assert!(pivot_source.contains("DurationWeeks = 3"));
    Ok(())
}
