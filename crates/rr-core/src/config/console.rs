//! Console configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use rr_protocol::{Address, DEFAULT_HOST, DEFAULT_PORT};

use super::serde_utils::duration_millis;

/// Configuration for the console (launcher) side
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Host of the session endpoint
    pub host: String,

    /// Port of the session endpoint
    pub port: u16,

    /// Keep retrying until the endpoint comes up
    pub wait: bool,

    /// Reconnect after every session ends
    pub persist: bool,

    /// Ask the endpoint to redirect its stdout/stderr to this console
    pub capture: bool,

    /// Delay between attachment attempts
    #[serde(with = "duration_millis")]
    pub retry_interval: Duration,

    /// Line editor history file, `None` disables history persistence
    pub history_file: Option<PathBuf>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            wait: false,
            persist: false,
            capture: true,
            retry_interval: Duration::from_secs(1),
            history_file: Some(super::default_config_dir().join("history")),
        }
    }
}

impl ConsoleConfig {
    /// Address of the endpoint to attach to
    pub fn endpoint_address(&self) -> Address {
        Address::new(self.host.clone(), self.port)
    }

    /// Whether connection failures should be retried
    pub fn retries(&self) -> bool {
        self.wait || self.persist
    }
}
