use thiserror::Error;

/// Errors produced by the load, join and export stages.
///
/// Every variant is surfaced to the user as a value; none of them should end
/// the session.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The sheet has no data rows below the header.
    #[error("The uploaded sheet has no data rows")]
    EmptyFile,

    /// One or more required report columns are absent.
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// Unreadable workbook or broken structure (e.g. nothing right of the anchor).
    #[error("Critical parse error: {0}")]
    CriticalParse(String),

    /// The master file lacks its key or classification column.
    #[error("Master file is missing columns: {}", .missing.join(", "))]
    Join { missing: Vec<String> },

    /// A scope selection that does not fit the loaded dataset.
    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<calamine::Error> for PipelineError {
    fn from(err: calamine::Error) -> Self {
        PipelineError::CriticalParse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
