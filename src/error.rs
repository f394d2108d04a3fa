//! Failure taxonomy shared by the loader, the resolver and the report
//! pipeline.

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a tabular source could not be turned into rows.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{description} not found at {location}")]
    NotFound {
        description: String,
        location: String,
    },

    #[error("{description} at {location} contains no data rows")]
    EmptyData {
        description: String,
        location: String,
    },

    #[error("could not decode {description} at {location} with any of: {}", tried.join(", "))]
    DecodeFailure {
        description: String,
        location: String,
        tried: Vec<String>,
    },

    #[error("{description} at {location} is not valid delimited text: {reason}")]
    Malformed {
        description: String,
        location: String,
        reason: String,
    },

    #[error("{description} is missing required columns: {}", missing.join(", "))]
    SchemaMismatch {
        description: String,
        missing: Vec<String>,
    },

    #[error("could not reach {description} at {location}: {source}")]
    Storage {
        description: String,
        location: String,
        #[source]
        source: BoxError,
    },
}

/// How loudly a failure should be surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Expected outcome of a valid request (e.g. nothing matched).
    Info,
    Warning,
    Error,
}

/// Everything that can end a single request.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Load(LoadError),

    #[error("chemist reference data unavailable: {0}")]
    ReferenceDataUnavailable(#[source] LoadError),

    #[error("invalid chemist identifier '{0}'")]
    InvalidChemist(String),

    #[error("could not build spreadsheet: {0}")]
    Export(#[from] rust_xlsxwriter::XlsxError),

    #[error("session store failure: {0}")]
    Session(#[source] BoxError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<LoadError> for ReportError {
    fn from(e: LoadError) -> Self {
        ReportError::Load(e)
    }
}

impl ReportError {
    pub fn severity(&self) -> Severity {
        match self {
            ReportError::Load(LoadError::NotFound { .. } | LoadError::Storage { .. }) => {
                Severity::Warning
            }
            ReportError::Load(LoadError::EmptyData { .. }) => Severity::Info,
            ReportError::InvalidChemist(_) => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Text shown to the user. Unexpected failures get a generic message;
    /// their detail goes to the log only.
    pub fn user_message(&self) -> String {
        match self {
            ReportError::Load(LoadError::NotFound { description, location }) => {
                format!("Error: {description} file not found at {location}. Please ensure the file exists.")
            }
            ReportError::Load(LoadError::EmptyData { description, .. }) => {
                format!("The {description} file appears to be empty.")
            }
            ReportError::Load(LoadError::DecodeFailure { description, .. }) => {
                format!("Error: Could not decode the {description} file with common encodings. Please check the file format.")
            }
            ReportError::Load(LoadError::Malformed { description, .. }) => {
                format!("Error reading the {description} file: it is not a valid CSV file.")
            }
            ReportError::Load(LoadError::SchemaMismatch { description, missing }) => {
                format!("Error: {description} is missing required columns: {}.", missing.join(", "))
            }
            ReportError::ReferenceDataUnavailable(_) => {
                "Error: chemist details could not be loaded.".to_string()
            }
            ReportError::InvalidChemist(raw) => {
                format!("Invalid chemist number '{raw}'. Ensure it's a whole number.")
            }
            ReportError::Export(_) => "Error generating Excel file for download.".to_string(),
            ReportError::Load(LoadError::Storage { description, .. }) => {
                format!("Error: Could not load {description} data from storage. Please try again later.")
            }
            ReportError::Session(_) | ReportError::Other(_) => {
                "An unexpected error occurred. Please try again.".to_string()
            }
        }
    }
}
