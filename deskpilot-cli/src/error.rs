use thiserror::Error;

use crate::envelope::Code;

/// Failures raised by the invocation layer itself, before or instead of an
/// operation outcome. Operation-reported failures travel through the result
/// normalizer, not through this enum.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("action '{group} {action}' changes desktop or system state; pass --dangerous to run it")]
    PolicyDenied { group: String, action: String },

    #[error("{0}")]
    BadArgs(String),

    #[error("unknown group '{0}'")]
    UnknownGroup(String),

    #[error("unknown action '{action}' in group '{group}'")]
    UnknownAction { group: String, action: String },

    #[error("{0}")]
    Internal(String),
}

impl CliError {
    pub fn code(&self) -> Code {
        match self {
            CliError::PolicyDenied { .. } => Code::PolicyDenied,
            CliError::BadArgs(_) | CliError::UnknownGroup(_) | CliError::UnknownAction { .. } => {
                Code::BadArgs
            }
            CliError::Internal(_) => Code::CliError,
        }
    }

    /// Lower-level classification for the envelope's `error.kind` field.
    pub fn kind(&self) -> &'static str {
        match self {
            CliError::PolicyDenied { .. } => "policy",
            CliError::BadArgs(_) | CliError::UnknownGroup(_) | CliError::UnknownAction { .. } => {
                "arguments"
            }
            CliError::Internal(_) => "internal",
        }
    }
}
