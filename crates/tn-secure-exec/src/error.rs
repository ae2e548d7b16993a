use std::time::Duration;
use thiserror::Error;
use tn_types::error::{TnError, ValidationError};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command {0:?} is not registered")]
    CommandNotAllowed(String),

    #[error("argument {index} rejected: {reason}")]
    ArgRejected { index: usize, reason: String },

    #[error("argument count {got} exceeds max {max}")]
    ArgCountExceeded { got: usize, max: usize },

    #[error("execution timed out after {0:?}")]
    Timeout(Duration),

    #[error("captured output exceeded cap of {cap} bytes")]
    OutputOversize { cap: usize },

    #[error("command exited with code {exit_code:?}")]
    ExecFailed {
        exit_code: Option<i32>,
        captured_stderr: String,
    },

    #[error("failed to spawn process: {0}")]
    Spawn(String),
}

/// Fold a [`CommandError`] into the shared taxonomy (spec §7): timeouts are
/// transient and retried by the caller's next tick; everything else about
/// *whether* the command was allowed to run is a validation problem, and
/// everything about *how* it ran is a command/5xx problem.
impl From<CommandError> for TnError {
    fn from(e: CommandError) -> Self {
        match e {
            CommandError::CommandNotAllowed(name) => {
                TnError::Validation(ValidationError::Field {
                    field: "command".into(),
                    reason: format!("{name:?} is not allowed"),
                })
            }
            CommandError::ArgRejected { index, reason } => {
                TnError::Validation(ValidationError::Field {
                    field: format!("args[{index}]"),
                    reason,
                })
            }
            CommandError::ArgCountExceeded { got, max } => {
                TnError::Validation(ValidationError::Field {
                    field: "args".into(),
                    reason: format!("{got} arguments exceeds max {max}"),
                })
            }
            CommandError::Timeout(d) => TnError::Transient(format!("timed out after {d:?}")),
            other => TnError::Command(other.to_string()),
        }
    }
}
