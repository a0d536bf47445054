//! Error type shared by the library and the `wx` binary.
//!
//! Exit codes:
//! - `2` structural or configuration problems (missing columns, bad options, I/O)
//! - `3` not enough data to produce a result
//! - `4` internal numerical failures

pub const EXIT_INPUT: u8 = 2;
pub const EXIT_INSUFFICIENT: u8 = 3;
pub const EXIT_COMPUTE: u8 = 4;

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

    /// A structural or configuration error (exit code 2).
    pub fn input(message: impl Into<String>) -> Self {
        Self::new(EXIT_INPUT, message)
    }

    /// Not enough usable data (exit code 3).
    pub fn insufficient(message: impl Into<String>) -> Self {
        Self::new(EXIT_INSUFFICIENT, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
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

impl From<csv::Error> for AppError {
    fn from(e: csv::Error) -> Self {
        AppError::input(format!("CSV error: {e}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::input(format!("I/O error: {e}"))
    }
}
