//! CLI error handling

use std::fmt;

use apkpipe_errors::UserFacingError;

#[derive(Debug)]
pub enum CliError {
    /// Pipeline, configuration or tool error
    Ops(apkpipe_errors::Error),
    /// Failed to render output
    Output(serde_json::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Ops(e) => {
                write!(f, "{}", e.user_message())?;
                if let Some(code) = e.user_code() {
                    write!(f, "\n  Code: {code}")?;
                }
                if let Some(hint) = e.user_hint() {
                    write!(f, "\n  Hint: {hint}")?;
                }
                Ok(())
            }
            CliError::Output(e) => write!(f, "failed to render output: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Ops(e) => Some(e),
            CliError::Output(e) => Some(e),
        }
    }
}

impl From<apkpipe_errors::Error> for CliError {
    fn from(e: apkpipe_errors::Error) -> Self {
        CliError::Ops(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Output(e)
    }
}
