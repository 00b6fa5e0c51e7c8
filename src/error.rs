//! Error types for ChainSight
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)
//!
//! Every pipeline stage returns [`Result`]. Errors are scoped to the feature
//! that raised them: a missing `Category` column disables the category rollup
//! but leaves the KPI cards intact (see [`Error::is_recoverable`]).

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// ChainSight error types
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed delimited input (unterminated quote, ragged rows, bad header)
    #[error("CSV parse error: {0}\nCheck that the file is UTF-8 CSV with one header row")]
    Parse(String),

    /// A column required by one feature is absent from the uploaded file
    #[error("Missing column '{column}' required for {feature}\nAdd the column or map it with a column alias")]
    MissingColumn {
        /// Canonical column name that could not be resolved
        column: String,
        /// Feature that needed the column
        feature: &'static str,
    },

    /// A single cell could not be coerced to its expected type
    #[error("Line {line}: cannot read {column} value '{value}': {reason}")]
    Coercion {
        /// 1-based line number in the source file (header is line 1)
        line: usize,
        /// Canonical column name
        column: String,
        /// Offending raw cell
        value: String,
        /// Human-readable reason
        reason: String,
    },

    /// Forecast preconditions unmet (history too short)
    #[error("Insufficient history: need at least {required} periods, got {got}\nForecast unavailable for this product")]
    InsufficientData {
        /// Minimum number of periods
        required: usize,
        /// Number of periods available
        got: usize,
    },

    /// Model fitting failed
    #[error("Model fit failed: {0}\nForecast unavailable for this product")]
    ModelFit(#[from] ModelFitError),

    /// Invalid parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reader/writer error that is not a structural parse failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Arrow error while building columnar views
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// JSON (configuration) error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Reasons a seasonal ARIMA fit can fail
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelFitError {
    /// Series has zero variance (all values identical), or the fitted
    /// model reproduces it exactly
    #[error("series is degenerate (zero variance across {len} observations)")]
    Degenerate {
        /// Number of observations
        len: usize,
    },

    /// Series contains NaN or infinite values
    #[error("series contains non-finite values")]
    NonFinite,

    /// Optimizer hit its iteration bound without meeting tolerance
    #[error("optimizer did not converge within {iterations} iterations")]
    NotConverged {
        /// Iterations spent
        iterations: usize,
    },

    /// Series too short for the requested orders even without seasonal terms
    #[error("series of {len} observations is too short for differencing order {order}")]
    TooShort {
        /// Number of observations
        len: usize,
        /// Total differencing order that had to be applied
        order: usize,
    },
}

impl Error {
    /// Whether the session can continue after this error.
    ///
    /// All pipeline errors are scoped to one user action. Only I/O failures
    /// on the local side (e.g. unreadable path) are reported as
    /// non-recoverable so the driver can stop.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Io(_))
    }

    /// Short feature-facing label used when rendering a diagnostic
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Parse(_) | Self::Csv(_) => "parse",
            Self::MissingColumn { .. } => "missing_column",
            Self::Coercion { .. } => "coercion",
            Self::InsufficientData { .. } => "insufficient_data",
            Self::ModelFit(_) => "model_fit",
            Self::InvalidInput(_) => "invalid_input",
            Self::Config(_) | Self::Json(_) => "config",
            Self::Io(_) => "io",
            Self::Arrow(_) | Self::Other(_) => "internal",
        }
    }
}
