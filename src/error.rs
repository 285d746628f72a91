//! Error types for the consumption engine.
//!
//! Ingestion itself is best-effort: a file that cannot be decoded becomes a
//! [`crate::consumption::FileOutcome::Skipped`] value, not an error. The
//! [`CabalError`] type covers the places where the dataframe engine, the
//! filesystem, or configuration can genuinely fail.
//!
//! ```no_run
//! use cabal::error::{Result, ResultExt as _};
//!
//! fn read_settings(path: &str) -> Result<String> {
//!     let raw = std::fs::read_to_string(path).context("Failed to read settings")?;
//!     Ok(raw)
//! }
//! ```

use std::fmt;

/// Main error type for cabal operations.
#[derive(Debug)]
pub enum CabalError {
    /// I/O errors (directory scans, config files, exports)
    Io(std::io::Error),

    /// Dataframe construction, grouping or CSV encoding failures
    DataProcessing(String),

    /// Configuration errors
    Config(String),

    /// Path could not be resolved or is not usable
    InvalidPath(String),

    /// Generic error with context
    Other(String),
}

impl fmt::Display for CabalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::DataProcessing(msg) => write!(f, "Data processing error: {msg}"),
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::InvalidPath(msg) => write!(f, "Invalid path: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for CabalError {}

impl From<std::io::Error> for CabalError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<anyhow::Error> for CabalError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<serde_json::Error> for CabalError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("JSON error: {err}"))
    }
}

impl From<polars::error::PolarsError> for CabalError {
    fn from(err: polars::error::PolarsError) -> Self {
        Self::DataProcessing(err.to_string())
    }
}

impl From<CabalError> for String {
    fn from(err: CabalError) -> Self {
        err.to_string()
    }
}

/// Result type alias for cabal operations.
pub type Result<T> = std::result::Result<T, CabalError>;

/// Extension trait to add context to results.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<CabalError>,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err: CabalError = e.into();
            CabalError::Other(format!("{}: {}", msg.into(), err))
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err: CabalError = e.into();
            CabalError::Other(format!("{}: {}", f(), err))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CabalError::DataProcessing("column not found".to_owned());
        assert_eq!(err.to_string(), "Data processing error: column not found");
    }

    #[test]
    fn test_polars_error_maps_to_data_processing() {
        let err: CabalError =
            polars::error::PolarsError::ColumnNotFound("Data".into()).into();
        assert!(
            matches!(err, CabalError::DataProcessing(_)),
            "polars failures are data processing errors"
        );
    }

    #[test]
    fn test_result_context() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "config.json",
        ));

        let result: Result<()> = result.context("Failed to read config");
        let message = result.map_err(String::from).err().unwrap_or_default();
        assert!(
            message.contains("Failed to read config"),
            "context should prefix the message: {message}"
        );
    }
}
