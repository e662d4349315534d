//! Error types.
//!
//! Two layers:
//!
//! - [`CmaError`] is what the numerical core returns. Its variants follow the
//!   failure classes of the engine (bad data, bad configuration, degenerate math)
//!   plus I/O and parse failures at the file boundary.
//! - [`AppError`] is what the `cma` binary reports: a message and a process exit code.

use thiserror::Error;

/// Errors produced by the risk and term-structure engines.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CmaError {
    /// Too few observations for a regression, or a series shorter than the weighting window.
    #[error("Insufficient data: {0}")]
    DataInsufficient(String),

    /// Configuration cannot be used as given (unknown reference, out-of-range parameter, cycle).
    #[error("Invalid configuration: {0}")]
    ConfigurationInvalid(String),

    /// A computation produced a non-finite value or a negative radicand.
    #[error("Numerically degenerate: {0}")]
    NumericDegenerate(String),

    /// File could not be read or written.
    #[error("I/O error: {0}")]
    Io(String),

    /// Input file content could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl CmaError {
    pub fn data(message: impl Into<String>) -> Self {
        CmaError::DataInsufficient(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        CmaError::ConfigurationInvalid(message.into())
    }

    pub fn degenerate(message: impl Into<String>) -> Self {
        CmaError::NumericDegenerate(message.into())
    }

    /// Same error class, message prefixed with `context`.
    pub fn context(&self, context: impl std::fmt::Display) -> Self {
        match self {
            CmaError::DataInsufficient(m) => CmaError::DataInsufficient(format!("{context}: {m}")),
            CmaError::ConfigurationInvalid(m) => CmaError::ConfigurationInvalid(format!("{context}: {m}")),
            CmaError::NumericDegenerate(m) => CmaError::NumericDegenerate(format!("{context}: {m}")),
            CmaError::Io(m) => CmaError::Io(format!("{context}: {m}")),
            CmaError::Parse(m) => CmaError::Parse(format!("{context}: {m}")),
        }
    }

    /// Exit code used when this error terminates the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            CmaError::ConfigurationInvalid(_) | CmaError::Io(_) | CmaError::Parse(_) => 2,
            CmaError::DataInsufficient(_) => 3,
            CmaError::NumericDegenerate(_) => 4,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<CmaError> for AppError {
    fn from(err: CmaError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_exit_codes() {
        assert_eq!(AppError::from(CmaError::config("lambda")).exit_code(), 2);
        assert_eq!(AppError::from(CmaError::data("short")).exit_code(), 3);
        assert_eq!(AppError::from(CmaError::degenerate("nan")).exit_code(), 4);
    }

    #[test]
    fn context_keeps_error_class() {
        let err = CmaError::data("3 points").context("Emerging");
        assert_eq!(err, CmaError::DataInsufficient("Emerging: 3 points".to_string()));
    }

    #[test]
    fn app_error_keeps_message() {
        let err = AppError::from(CmaError::data("series X has 12 observations"));
        assert!(err.to_string().contains("series X has 12 observations"));
    }
}
