//! Error classification shared by the model and workspace layers.

use serde::Serialize;

/// Broad class of a failure, used by frontends to decide how to report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorClass {
    /// Configuration or environment problem the user can fix.
    /// Reported as a plain message without a backtrace.
    User,
    /// Optimistic-lock or duplicate-node conflict. Callers are expected to
    /// catch these and retry with fresh state.
    Conflict,
    /// Integrity fault (wrong lifecycle state, plugin mismatch, I/O, ...).
    Fault,
    /// The run was aborted by the exceptional-condition policy.
    Policy,
}

impl ErrorClass {
    /// Whether the error should be reported as a plain message.
    pub fn is_user_facing(self) -> bool {
        matches!(self, ErrorClass::User | ErrorClass::Policy)
    }
}

/// Classify an `anyhow::Error` by looking for a known error type in its chain.
pub fn classify(error: &anyhow::Error) -> ErrorClass {
    for cause in error.chain() {
        if let Some(err) = cause.downcast_ref::<crate::model::ModelError>() {
            return err.class();
        }
        if let Some(err) = cause.downcast_ref::<crate::workspace::WorkspaceError>() {
            return err.class();
        }
        if let Some(err) = cause.downcast_ref::<crate::config::ConfigError>() {
            return err.class();
        }
    }
    ErrorClass::Fault
}
