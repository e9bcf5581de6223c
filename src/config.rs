use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants;
use crate::error::{ReconError, Result};

/// Default location of the optional configuration file
pub const DEFAULT_CONFIG_PATH: &str = "recon.toml";

/// Immutable run configuration handed to every stage.
///
/// All sections fall back to the built-in values, so an empty file (or no file
/// at all) yields the production defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub filter: FilterConfig,
    pub rules: RuleConfig,
    pub schema: SchemaConfig,
    pub pivot: PivotConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub weekly: PathBuf,
    pub history: PathBuf,
    pub mapping: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            weekly: PathBuf::from("weekly_feedback.xlsx"),
            history: PathBuf::from("history_feedback.xlsx"),
            mapping: PathBuf::from("error_code_mapping.xlsx"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Single JSON workbook file
    Json,
    /// Directory with one CSV file per sheet
    Csv,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: PathBuf,
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(constants::DEFAULT_OUTPUT_FILE),
            format: OutputFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Actionable status strings (compared after whitespace normalization)
    pub statuses: Vec<String>,
    /// Length of the trailing window ending at the newest update
    pub window_days: i64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            statuses: vec![
                "רשומה הועברה לטיפול מעסיק".to_string(),
                "רשומה לא נקלטה על ידי יצרן - נדחה על ידי יצרן".to_string(),
                "רשומה לא נקלטה על ידי יצרן - הועבר להמשך טיפול אצל יצרן".to_string(),
                "רשומה נקלטה - נמצא חוסר בא.כ.ע".to_string(),
            ],
            window_days: 7,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Error codes for which prior successful ingestion is looked up
    pub override_codes: Vec<i64>,
    /// Substring of a historical status that marks a successful ingestion
    pub success_marker: String,
    /// Error codes that are never classified
    pub ignored_error_codes: Vec<i64>,
    pub unknown_responsibility: String,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            override_codes: vec![4, 5, 15, 93],
            success_marker: "נקלט".to_string(),
            ignored_error_codes: vec![1],
            unknown_responsibility: constants::UNKNOWN_RESPONSIBILITY.to_string(),
        }
    }
}

impl RuleConfig {
    pub fn override_code_set(&self) -> HashSet<i64> {
        self.override_codes.iter().copied().collect()
    }

    pub fn ignored_code_set(&self) -> HashSet<i64> {
        self.ignored_error_codes.iter().copied().collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// First and last letter of the working alphabet kept by header normalization
    pub alphabet: (char, char),
    /// Canonical field name -> keywords looked for in normalized headers
    pub keywords: BTreeMap<String, Vec<String>>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            alphabet: ('א', 'ת'),
            keywords: default_keywords(),
        }
    }
}

impl SchemaConfig {
    pub fn keywords_for(&self, canonical: &str) -> &[String] {
        self.keywords
            .get(canonical)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn keyword_list(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

/// Keywords are compared against normalized headers, so entries holding
/// punctuation never match. Mapping columns carry no keywords and resolve by
/// exact name only.
fn default_keywords() -> BTreeMap<String, Vec<String>> {
    let mut map = BTreeMap::new();
    map.insert(
        "CustomerNumber".to_string(),
        keyword_list(&[
            "customernumber", "customer", "customerid", "employer", "employerid",
            "מספרלקוח", "מספרמעסיק", "מספרארגון", "מספרח.פ", "מספרהעסקה", "מזההמעסיק",
        ]),
    );
    map.insert(
        "KodKupa_IdentityNumber".to_string(),
        keyword_list(&[
            "kodkupa_identitynumber", "kodkupaidentity", "kodkupa", "codefund",
            "חפחברה", "ח.פ.חברה", "חפחברהמנהל", "מספרחברה", "מספרח.פ.חברה", "חפמייצג",
        ]),
    );
    map.insert(
        "KodKupa_IncomeTax".to_string(),
        keyword_list(&[
            "kodkupa_incometax", "kodkupa_incomtax", "kupa_tax", "קודקופהבאוצר",
            "מספרקופהבאוצר", "מספרקופה", "מספרמשלם", "קודקופה",
        ]),
    );
    map.insert(
        "MISPAR_MEZAHE_OVED".to_string(),
        keyword_list(&[
            "misparmezaheoved", "mispar_mezahe_oved", "misparmezahe", "מספרזההעובד",
            "מספרעובד", "תז", "תעודתזהות", "מזההעובד", "ת.ז.",
        ]),
    );
    map.insert(
        "FeedbackStatus".to_string(),
        keyword_list(&[
            "feedbackstatus", "feedback_status", "סטטוס", "סטטוסרומה", "סטטוסרשומה",
            "סטטוסהדיווח", "status", "statuscode",
        ]),
    );
    map.insert(
        "ErrorCodeV4Id".to_string(),
        keyword_list(&[
            "errorcodev4id", "errorcode", "errorcodev4", "shgiah", "קודשגיאה",
            "מספרשגיאה", "kodshgia", "errorcodeid",
        ]),
    );
    map.insert(
        "ErrorCodeV4Description".to_string(),
        keyword_list(&[
            "errorcodev4description", "errorcodedescription", "description", "תיאור",
            "תיאורשגיאה", "תיאורתקלה", "שגיאה", "errorcodedesc",
        ]),
    );
    map.insert(
        "UpdateDate".to_string(),
        keyword_list(&[
            "updatedate", "statuslastupdatedate", "laststatusupdate", "תאריךעדכון",
            "תאריך", "תאריךסטטוס", "תאריךעדכוןסטטוס", "statusupdatedate", "תאריךדיווח",
            "תאריךדיווח1", "תאריךדיווח2", "תאריךדיווח21",
        ]),
    );
    map.insert(
        "StatusLastUpdateDate".to_string(),
        keyword_list(&[
            "statuslastupdatedate", "statuslastupdate", "dateofstatusupdate",
            "תאריךעדכוןסטטוס", "תאריךסטטוס",
        ]),
    );
    map
}

/// External command that turns the long-form pivot source into a native pivot
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PivotConfig {
    pub command: Option<String>,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

impl ReconConfig {
    /// Load configuration from an explicit path, `RECON_CONFIG`, or
    /// `recon.toml` when present, then apply `RECON_HOST` / `RECON_PORT`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("RECON_CONFIG").ok().map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Self::default(),
        };

        if let Ok(host) = std::env::var("RECON_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("RECON_PORT") {
            config.server.port = port
                .parse()
                .map_err(|e| ReconError::Config(format!("Invalid RECON_PORT '{}': {}", port, e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ReconError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ReconConfig = toml::from_str(content)?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(0..=constants::MAX_WINDOW_DAYS).contains(&self.filter.window_days) {
            return Err(ReconError::Config(format!(
                "filter.window_days must be between 0 and {} (got {})",
                constants::MAX_WINDOW_DAYS,
                self.filter.window_days
            )));
        }
        let (start, end) = self.schema.alphabet;
        if start > end {
            return Err(ReconError::Config(format!(
                "schema.alphabet range is inverted: '{}' > '{}'",
                start, end
            )));
        }
        Ok(())
    }
}
