/// Sheet names of the output artifact
pub const DRAFTS_SHEET: &str = "Drafts";
pub const PIVOT_SOURCE_SHEET: &str = "PIVOT_SOURCE";
pub const PIVOT_SHEET: &str = "PIVOT";
pub const ISSUES_SHEET: &str = "Processing Issues";

/// Sheet name accepted as the data sheet when no sheet matches by header
pub const FALLBACK_DATA_SHEET: &str = "data";

// Output column labels (shared by the detail, pivot and issue tables)
pub const COL_CUSTOMER_NUMBER: &str = "CustomerNumber";
pub const COL_EMPLOYEE_ID: &str = "EmployeeID";
pub const COL_KUPA_ID: &str = "KupaID";
pub const COL_FUND_IDENTITY: &str = "KodKupa_IdentityNumber";
pub const COL_FUND_TAX: &str = "KodKupa_IncomeTax";
pub const COL_ERROR_CODE: &str = "ErrorCode";
pub const COL_ERROR_DESCRIPTION: &str = "ErrorDescription";
pub const COL_UPDATE_DATE: &str = "UpdateDate";
pub const COL_DURATION_WEEKS: &str = "DurationWeeks";
pub const COL_RESPONSIBILITY: &str = "Responsibility";
pub const COL_OVERRIDE_TRIGGERED: &str = "OverrideTriggered";
pub const COL_ORIGINAL_STATUS: &str = "OriginalStatus";
pub const COL_DURATION_BUCKET: &str = "DurationBucket";
pub const COL_UNIQUE_EMPLOYEES: &str = "UniqueEmployees";
pub const COL_ISSUE_TYPE: &str = "IssueType";
pub const COL_FEEDBACK_STATUS: &str = "FeedbackStatus";

pub const ISSUE_MISSING_MAPPING: &str = "MissingErrorMapping";

/// Responsibility assigned when an error code has no mapping rule
pub const UNKNOWN_RESPONSIBILITY: &str = "Unknown";

/// Message reported for a run that filtered down to nothing
pub const NOTHING_TO_DO: &str = "No records require handling after filtering.";

/// Default artifact file name
pub const DEFAULT_OUTPUT_FILE: &str = "Recon_Results.json";

/// Largest accepted `filter.window_days` (about a century)
pub const MAX_WINDOW_DAYS: i64 = 36_500;

/// Upper bound for the `X-Recon-Message` response header
pub const MAX_MESSAGE_HEADER_BYTES: usize = 5000;
