//! Forward pipeline events to tracing

use apkpipe_events::{AppEvent, EventReceiver, GeneralEvent, PackagingEvent};
use tracing::{debug, error, info, trace, warn};

/// Log one event at the level it reports, with structured fields.
pub fn log_event_with_tracing(event: &AppEvent) {
    let source = event.event_source();
    match event {
        AppEvent::General(general) => match general {
            GeneralEvent::Warning { message, context } => {
                warn!(source = source.as_str(), context = ?context, "{message}");
            }
            GeneralEvent::Error { message, details } => {
                error!(source = source.as_str(), details = ?details, "{message}");
            }
            GeneralEvent::DebugLog { message } => {
                debug!(source = source.as_str(), "{message}");
            }
        },
        AppEvent::Packaging(packaging) => match packaging {
            PackagingEvent::PipelineStarted { target, actions } => {
                info!(source = source.as_str(), binary = %target, actions, "Pipeline started");
            }
            PackagingEvent::ActionStarted {
                index,
                total,
                action,
                description,
            } => {
                info!(
                    source = source.as_str(),
                    action = %action,
                    "[{index}/{total}] {description}"
                );
            }
            PackagingEvent::ActionCompleted { action, duration } => {
                debug!(
                    source = source.as_str(),
                    action = %action,
                    duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
                    "Action completed"
                );
            }
            PackagingEvent::ActionFailed {
                action,
                description,
                failure,
            } => {
                error!(
                    source = source.as_str(),
                    action = %action,
                    description = %description,
                    code = ?failure.code,
                    hint = ?failure.hint,
                    "{}",
                    failure.message
                );
            }
            PackagingEvent::DexUnit { output, cached } => {
                trace!(
                    source = source.as_str(),
                    output = %output.display(),
                    cached,
                    "Dex unit"
                );
            }
            PackagingEvent::Message { text } => {
                info!(source = source.as_str(), "{text}");
            }
            PackagingEvent::PipelineCompleted { target, apk_path } => {
                info!(
                    source = source.as_str(),
                    binary = %target,
                    apk = %apk_path.display(),
                    "Pipeline completed"
                );
            }
            PackagingEvent::PipelineFailed { target, failure } => {
                error!(
                    source = source.as_str(),
                    binary = %target,
                    code = ?failure.code,
                    "{}",
                    failure.message
                );
            }
        },
    }
}

/// Drain the channel until every sender is gone.
pub async fn drain(mut rx: EventReceiver) {
    while let Some(event) = rx.recv().await {
        log_event_with_tracing(&event);
    }
}
