use serde::{Deserialize, Serialize};

use crate::{EventLevel, EventSource};
use apkpipe_errors::UserFacingError;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    pub retryable: bool,
}

impl FailureContext {
    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self {
            code: error.user_code().map(Into::into),
            message: error.user_message().into_owned(),
            hint: error.user_hint().map(Into::into),
            retryable: error.is_retryable(),
        }
    }
}

pub mod general;
pub mod packaging;

pub use general::*;
pub use packaging::*;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (warnings, errors, debug output)
    General(GeneralEvent),

    /// Packaging pipeline events (actions, dexing, artifacts)
    Packaging(PackagingEvent),
}

impl AppEvent {
    /// Identify the source domain for this event
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::General(_) => EventSource::GENERAL,
            Self::Packaging(PackagingEvent::DexUnit { .. }) => EventSource::DEX,
            Self::Packaging(_) => EventSource::PACKAGING,
        }
    }

    /// Severity of this event
    #[must_use]
    pub fn level(&self) -> EventLevel {
        match self {
            Self::General(GeneralEvent::Error { .. })
            | Self::Packaging(
                PackagingEvent::ActionFailed { .. } | PackagingEvent::PipelineFailed { .. },
            ) => EventLevel::Error,

            Self::General(GeneralEvent::Warning { .. }) => EventLevel::Warn,

            Self::General(GeneralEvent::DebugLog { .. })
            | Self::Packaging(PackagingEvent::ActionCompleted { .. }) => EventLevel::Debug,

            Self::Packaging(PackagingEvent::DexUnit { .. }) => EventLevel::Trace,

            _ => EventLevel::Info,
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        self.level().into()
    }
}
