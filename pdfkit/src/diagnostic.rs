//! Injected diagnostics (spec §7): components that recover from a
//! non-fatal inconsistency (an orphaned structure-tree reference, an
//! operator skipped during tracing) report it through a [`DiagnosticSink`]
//! instead of deciding for the caller whether that should be visible.
//!
//! The default sink forwards to `log`, the same crate the teacher's
//! `file.rs` calls `info!`/`trace!` through; callers that want the warnings
//! collected (e.g. the CLI, to print a summary) can supply their own.

use std::fmt;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Severity {
    Debug,
    Warning,
}

pub trait DiagnosticSink {
    fn report(&self, severity: Severity, message: fmt::Arguments);
}

/// Forwards everything to the `log` crate at the matching level.
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, severity: Severity, message: fmt::Arguments) {
        match severity {
            Severity::Debug => log::debug!("{}", message),
            Severity::Warning => log::warn!("{}", message),
        }
    }
}

/// Collects diagnostics in order instead of emitting them, for callers (the
/// CLI, tests) that want to inspect what happened rather than just log it.
#[derive(Default)]
pub struct CollectingSink {
    messages: std::sync::Mutex<Vec<(Severity, String)>>,
}

impl CollectingSink {
    pub fn new() -> CollectingSink {
        CollectingSink::default()
    }

    pub fn take(&self) -> Vec<(Severity, String)> {
        std::mem::take(&mut self.messages.lock().expect("diagnostic sink mutex poisoned"))
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, severity: Severity, message: fmt::Arguments) {
        self.messages
            .lock()
            .expect("diagnostic sink mutex poisoned")
            .push((severity, message.to_string()));
    }
}

macro_rules! diag_warn {
    ($sink:expr, $($t:tt)*) => {
        $sink.report($crate::diagnostic::Severity::Warning, format_args!($($t)*))
    }
}
macro_rules! diag_debug {
    ($sink:expr, $($t:tt)*) => {
        $sink.report($crate::diagnostic::Severity::Debug, format_args!($($t)*))
    }
}
pub(crate) use diag_debug;
pub(crate) use diag_warn;
