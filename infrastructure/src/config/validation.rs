//! Structured configuration issues.
//!
//! [`FileConfig::validate`](super::FileConfig::validate) collects every
//! problem it finds instead of stopping at the first; the binary aborts on
//! any [`Severity::Error`] and logs the warnings.

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fatal: the server cannot start with this configuration.
    Error,
    /// Non-fatal: the value was adjusted or ignored.
    Warning,
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssueCode {
    /// A value is outside its accepted range or cannot be parsed.
    InvalidValue { field: String, value: String },
    /// A required value is empty.
    EmptyValue { field: String },
    /// Two entries share an identifier that must be unique.
    Duplicate { field: String, value: String },
    /// A value refers to something that is not configured.
    UnknownReference { field: String, value: String },
    /// Fewer enabled providers than peer review needs.
    TooFewProviders { enabled: usize },
    /// No subscription tier is configured.
    NoTiers,
}

/// A detected issue in the configuration.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn error(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}
