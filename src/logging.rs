//! Tracing bootstrap for hosts embedding the engine.
//!
//! Console output is compact and filtered by the usual `RUST_LOG`-style
//! directive. Setting `PLACEMENT_LOG_DIR` additionally mirrors events to a
//! daily-rolling JSON file so placement runs can be audited after the
//! fact. Hosts wrap each session in [`session_span`]; the engine's
//! selection and adjustment events then inherit the session id.

use tracing::Span;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Keeps the non-blocking audit writer flushing until dropped.
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber. `directive` is an `EnvFilter` expression,
/// e.g. `"info,placement_engine=debug"`.
pub fn init_tracing(directive: &str) -> LogGuard {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let (audit_layer, audit_guard) = match audit_dir() {
        Some(dir) => {
            let appender = RollingFileAppender::new(Rotation::DAILY, &dir, "placement-audit.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_target(true))
        .with(audit_layer)
        .init();

    LogGuard { _file: audit_guard }
}

/// Span scoping engine events to one student's session.
pub fn session_span(session_id: &str) -> Span {
    tracing::info_span!("placement_session", session = %session_id)
}

fn audit_dir() -> Option<String> {
    let dir = std::env::var("PLACEMENT_LOG_DIR").ok()?;
    if dir.trim().is_empty() {
        return None;
    }
    if let Err(err) = std::fs::create_dir_all(&dir) {
        eprintln!("failed to create log directory {dir}: {err}");
        return None;
    }
    Some(dir)
}
