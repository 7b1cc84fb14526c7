//! Packaging pipeline error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum BuildError {
    #[error("build failed: {message}")]
    Failed { message: String },

    #[error("action `{action}` failed: {message}")]
    ActionFailed { action: String, message: String },

    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("failed to launch {tool}: {message}")]
    ToolLaunchFailed { tool: String, message: String },

    #[error("classpath entries should be relative rather than absolute paths: {path}")]
    AbsoluteClasspathEntry { path: String },

    #[error("obfuscated outputs collide: {first} and {second} both map to {output}")]
    ObfuscationOutputCollision {
        first: String,
        second: String,
        output: String,
    },

    #[error("missing input: {path}")]
    MissingInput { path: String },

    #[error("archive error: {message}")]
    ArchiveFailed { message: String },

    #[error("invalid path: {path} - {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("keystore properties error: {message}")]
    KeystoreProperties { message: String },

    #[error("background task failed: {message}")]
    TaskFailed { message: String },
}

impl UserFacingError for BuildError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::ToolLaunchFailed { .. } => {
                Some("Check the [tools] section of the configuration file.")
            }
            Self::AbsoluteClasspathEntry { .. } => {
                Some("Pass classpath entries relative to the project root.")
            }
            Self::KeystoreProperties { .. } => Some(
                "The keystore properties file needs key.store.password, key.alias and key.alias.password.",
            ),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::TaskFailed { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::Failed { .. } => "build.failed",
            Self::ActionFailed { .. } => "build.action_failed",
            Self::ToolFailed { .. } => "build.tool_failed",
            Self::ToolLaunchFailed { .. } => "build.tool_launch_failed",
            Self::AbsoluteClasspathEntry { .. } => "build.absolute_classpath_entry",
            Self::ObfuscationOutputCollision { .. } => "build.obfuscation_output_collision",
            Self::MissingInput { .. } => "build.missing_input",
            Self::ArchiveFailed { .. } => "build.archive_failed",
            Self::InvalidPath { .. } => "build.invalid_path",
            Self::KeystoreProperties { .. } => "build.keystore_properties",
            Self::TaskFailed { .. } => "build.task_failed",
        };
        Some(code)
    }
}
