use std::error::Error;

/// Error raised on purpose by test producers. Each instance carries a unique
/// message so a test can check it got back the exact error it raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomError {
    pub message: String,
}

impl CustomError {
    pub fn new(message: impl Into<String>) -> Self {
        CustomError {
            message: message.into(),
        }
    }

    /// A `CustomError` with a random message.
    pub fn unique() -> Self {
        Self::new(format!("custom error {}", uuid::Uuid::new_v4()))
    }
}

impl std::fmt::Display for CustomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for CustomError {}
