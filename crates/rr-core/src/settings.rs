//! Process-wide REPL settings
//!
//! The pager flag, the system-command hook and the process output streams
//! are shared by everything running in the host process. A remote session
//! swaps them for its duration and puts them back afterwards; see
//! `rr_endpoint::SessionContext`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

use crate::traits::{InheritedSystem, OutputSink, StdStream, SystemCommand};

/// A copy of every swappable setting
#[derive(Clone)]
pub struct SettingsSnapshot {
    /// Whether long output goes through a pager
    pub pager: bool,
    /// Shell escape handler
    pub system: Arc<dyn SystemCommand>,
    /// Where host output goes
    pub stdout: Arc<dyn OutputSink>,
    /// Where host diagnostics go
    pub stderr: Arc<dyn OutputSink>,
}

impl Default for SettingsSnapshot {
    fn default() -> Self {
        Self {
            pager: true,
            system: Arc::new(InheritedSystem::default()),
            stdout: Arc::new(StdStream::Stdout),
            stderr: Arc::new(StdStream::Stderr),
        }
    }
}

impl std::fmt::Debug for SettingsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsSnapshot")
            .field("pager", &self.pager)
            .finish_non_exhaustive()
    }
}

/// Interpreter-wide configuration shared by the host process and REPL engines
#[derive(Default)]
pub struct ReplSettings {
    current: RwLock<SettingsSnapshot>,
    session_active: AtomicBool,
}

static GLOBAL: OnceLock<Arc<ReplSettings>> = OnceLock::new();

impl ReplSettings {
    /// Fresh settings with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// The settings instance for this process
    pub fn global() -> Arc<ReplSettings> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(ReplSettings::new())))
    }

    pub fn pager(&self) -> bool {
        self.read().pager
    }

    pub fn set_pager(&self, enabled: bool) {
        self.write().pager = enabled;
    }

    pub fn system(&self) -> Arc<dyn SystemCommand> {
        Arc::clone(&self.read().system)
    }

    pub fn set_system(&self, system: Arc<dyn SystemCommand>) {
        self.write().system = system;
    }

    /// Current host output stream
    pub fn stdout(&self) -> Arc<dyn OutputSink> {
        Arc::clone(&self.read().stdout)
    }

    pub fn set_stdout(&self, sink: Arc<dyn OutputSink>) {
        self.write().stdout = sink;
    }

    /// Current host diagnostic stream
    pub fn stderr(&self) -> Arc<dyn OutputSink> {
        Arc::clone(&self.read().stderr)
    }

    pub fn set_stderr(&self, sink: Arc<dyn OutputSink>) {
        self.write().stderr = sink;
    }

    /// Copy of the current values
    pub fn snapshot(&self) -> SettingsSnapshot {
        self.read().clone()
    }

    /// Replace every value at once
    pub fn restore(&self, snapshot: SettingsSnapshot) {
        *self.write() = snapshot;
    }

    /// Mark a session as holding these settings.
    ///
    /// Returns false if another session already holds them.
    pub fn try_begin_session(&self) -> bool {
        self.session_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Release the session mark
    pub fn end_session(&self) {
        self.session_active.store(false, Ordering::Release);
    }

    /// Whether a session currently holds these settings
    pub fn session_active(&self) -> bool {
        self.session_active.load(Ordering::Acquire)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SettingsSnapshot> {
        self.current.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, SettingsSnapshot> {
        self.current.write().unwrap_or_else(|e| e.into_inner())
    }
}
