use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing column '{field}' in {source_name}. Available columns: {available}")]
    MissingColumn {
        field: String,
        source_name: String,
        available: String,
    },

    #[error("Could not find a valid data sheet in {0}")]
    NoDataSheet(String),

    #[error("Sheet '{sheet}' not found in {path}")]
    SheetNotFound { path: String, sheet: String },

    #[error("Output error: {0}")]
    Output(String),
}

pub type Result<T> = std::result::Result<T, ReconError>;
