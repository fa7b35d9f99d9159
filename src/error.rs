//! Application error type.
//!
//! Every fallible pipeline operation returns `Result<_, AppError>`. The error
//! carries a process exit code (used by the `vet` binary) and a human-readable
//! message. `ErrorKind` classifies errors so callers can tell a fatal
//! pipeline failure apart from bad input or configuration.

/// Broad classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration or CLI arguments.
    Config,
    /// Malformed input data (scenario file, CSV, catalog payload).
    Input,
    /// No localization exists for the event at or before the cutoff.
    LocalizationNotFound,
    /// Neither light-curve model could be fit.
    FitFailed,
    /// Filesystem failure.
    Io,
    /// A store or other collaborator failed in a way the pipeline cannot absorb.
    Collaborator,
}

impl ErrorKind {
    fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Config | ErrorKind::Input | ErrorKind::Io => 2,
            ErrorKind::LocalizationNotFound => 3,
            ErrorKind::FitFailed => 4,
            ErrorKind::Collaborator => 5,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    kind: ErrorKind,
    message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Input, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn exit_code(&self) -> u8 {
        self.kind.exit_code()
    }

    /// True for errors that abort a vetting run (as opposed to bad input).
    pub fn is_fatal_pipeline_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::LocalizationNotFound | ErrorKind::FitFailed
        )
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
            .field("kind", &self.kind)
            .field("exit_code", &self.exit_code())
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<crate::store::StoreError> for AppError {
    fn from(err: crate::store::StoreError) -> Self {
        AppError::new(ErrorKind::Collaborator, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_kind() {
        assert_eq!(AppError::config("x").exit_code(), 2);
        assert_eq!(
            AppError::new(ErrorKind::LocalizationNotFound, "x").exit_code(),
            3
        );
        assert_eq!(AppError::new(ErrorKind::FitFailed, "x").exit_code(), 4);
    }

    #[test]
    fn only_pipeline_failures_are_fatal() {
        assert!(AppError::new(ErrorKind::FitFailed, "x").is_fatal_pipeline_error());
        assert!(!AppError::input("bad row").is_fatal_pipeline_error());
    }
}
