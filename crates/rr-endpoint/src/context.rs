//! Scoped ownership of the process-wide REPL settings
//!
//! A `SessionContext` snapshots the settings, applies the session's values,
//! and puts the snapshot back when dropped. Dropping happens on every way
//! out of a session, including an error or a panic in the REPL engine.

use std::sync::Arc;

use rr_core::{OutputSink, ReplSettings, SessionError, SettingsSnapshot, SystemCommand};

/// Streams the host process output should be sent to during a session
#[derive(Clone, Default)]
pub struct Redirect {
    pub stdout: Option<Arc<dyn OutputSink>>,
    pub stderr: Option<Arc<dyn OutputSink>>,
}

impl Redirect {
    /// Leave the process streams untouched
    pub fn none() -> Self {
        Self::default()
    }
}

/// Holds the settings for one session and restores them on drop
pub struct SessionContext {
    settings: Arc<ReplSettings>,
    saved: Option<SettingsSnapshot>,
}

impl SessionContext {
    /// Take exclusive hold of `settings` and apply the session values:
    /// pager off, `system` as the shell hook, streams per `redirect`.
    pub fn acquire(
        settings: Arc<ReplSettings>,
        redirect: Redirect,
        system: Arc<dyn SystemCommand>,
    ) -> Result<Self, SessionError> {
        if !settings.try_begin_session() {
            return Err(SessionError::ContextBusy);
        }

        // Guard exists before anything is changed, so a partial setup is undone
        let context = Self {
            saved: Some(settings.snapshot()),
            settings,
        };

        if let Some(stdout) = redirect.stdout {
            context.settings.set_stdout(stdout);
        }
        if let Some(stderr) = redirect.stderr {
            context.settings.set_stderr(stderr);
        }
        context.settings.set_pager(false);
        context.settings.set_system(system);

        tracing::debug!("Session context acquired");
        Ok(context)
    }

    /// Settings held by this context
    pub fn settings(&self) -> &Arc<ReplSettings> {
        &self.settings
    }

    /// Restore the snapshot now instead of at drop
    pub fn release(mut self) {
        self.restore();
    }

    fn restore(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.settings.restore(saved);
            self.settings.end_session();
            tracing::debug!("Session context restored");
        }
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        self.restore();
    }
}
