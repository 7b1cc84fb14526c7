use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::FailureContext;

/// Events emitted while the packaging pipeline executes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PackagingEvent {
    /// The action list was built and execution is about to begin
    PipelineStarted { target: String, actions: usize },

    /// One action started; `index` is 1-based
    ActionStarted {
        index: usize,
        total: usize,
        action: String,
        description: String,
    },

    ActionCompleted { action: String, duration: Duration },

    /// An action failed and the remaining actions were not run
    ActionFailed {
        action: String,
        description: String,
        failure: FailureContext,
    },

    /// Smart dexing handled one output
    DexUnit { output: PathBuf, cached: bool },

    /// Output of the echo step
    Message { text: String },

    PipelineCompleted { target: String, apk_path: PathBuf },

    PipelineFailed {
        target: String,
        failure: FailureContext,
    },
}
