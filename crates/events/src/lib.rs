#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Event system for async communication in apkpipe
//!
//! Library crates never print or log directly. They emit `AppEvent`s over an
//! unbounded channel and the CLI decides how to render them, usually by
//! forwarding each one to `tracing` at the level the event itself reports.

pub mod meta;
pub use meta::{EventLevel, EventSource};

pub mod events;
pub use events::{AppEvent, FailureContext, GeneralEvent, PackagingEvent};

use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// Type alias for event sender using the `AppEvent` system
pub type EventSender = UnboundedSender<AppEvent>;

/// Type alias for event receiver using the `AppEvent` system
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<AppEvent>;

/// Create a new event channel with the `AppEvent` system
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// The unified trait for emitting events
///
/// Implemented by the raw `EventSender` and by any struct that holds one.
pub trait EventEmitter {
    /// Get the event sender for this emitter
    fn event_sender(&self) -> Option<&EventSender>;

    /// Emit an event through this emitter
    fn emit(&self, event: AppEvent) {
        if let Some(sender) = self.event_sender() {
            // A dropped receiver only means nobody is listening
            let _ = sender.send(event);
        }
    }

    fn emit_debug(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::debug(message)));
    }

    fn emit_warning(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning(message)));
    }

    fn emit_error(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::error(message)));
    }

    /// Emit a pipeline started event
    fn emit_pipeline_started(&self, target: impl Into<String>, actions: usize) {
        self.emit(AppEvent::Packaging(PackagingEvent::PipelineStarted {
            target: target.into(),
            actions,
        }));
    }

    /// Emit an action started event
    fn emit_action_started(
        &self,
        index: usize,
        total: usize,
        action: impl Into<String>,
        description: impl Into<String>,
    ) {
        self.emit(AppEvent::Packaging(PackagingEvent::ActionStarted {
            index,
            total,
            action: action.into(),
            description: description.into(),
        }));
    }

    /// Emit an action completed event
    fn emit_action_completed(&self, action: impl Into<String>, duration: Duration) {
        self.emit(AppEvent::Packaging(PackagingEvent::ActionCompleted {
            action: action.into(),
            duration,
        }));
    }

    /// Emit an action failed event
    fn emit_action_failed(
        &self,
        action: impl Into<String>,
        description: impl Into<String>,
        failure: FailureContext,
    ) {
        self.emit(AppEvent::Packaging(PackagingEvent::ActionFailed {
            action: action.into(),
            description: description.into(),
            failure,
        }));
    }

    /// Emit a pipeline completed event
    fn emit_pipeline_completed(&self, target: impl Into<String>, apk_path: PathBuf) {
        self.emit(AppEvent::Packaging(PackagingEvent::PipelineCompleted {
            target: target.into(),
            apk_path,
        }));
    }
}

/// Implementation of `EventEmitter` for the raw `EventSender`
impl EventEmitter for EventSender {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(self)
    }
}
