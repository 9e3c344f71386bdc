//! Application error type.
//!
//! Every failure that reaches `main` is an `AppError` carrying the process exit
//! code. Codes in use:
//!
//! - `2`: input/output or configuration problems (missing files, bad JSON, bad ROOT data)
//! - `3`: insufficient data (e.g. every channel of an object is excluded)
//! - `4`: numerical failures (incompatible binning, non-finite fit output)

use crate::root::RootError;

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

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Prefix the message with extra context (file name, object name, ...).
    pub fn context(self, context: impl std::fmt::Display) -> Self {
        Self {
            exit_code: self.exit_code,
            message: format!("{context}: {}", self.message),
        }
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

impl From<RootError> for AppError {
    fn from(err: RootError) -> Self {
        AppError::new(2, format!("ROOT read error: {err}"))
    }
}
