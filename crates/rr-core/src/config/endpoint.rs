//! Endpoint configuration

use serde::{Deserialize, Serialize};

use rr_protocol::{Address, DEFAULT_HOST, DEFAULT_PORT};

/// Configuration for a session endpoint hosted in the target process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Host to bind
    pub host: String,

    /// Port to bind (0 picks an ephemeral port)
    pub port: u16,

    /// Redirect process output to the console when it offers streams
    pub capture: bool,

    /// Shell used for system commands, `None` uses the platform shell
    pub shell: Option<String>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            capture: true,
            shell: None,
        }
    }
}

impl EndpointConfig {
    /// Address the endpoint binds
    pub fn address(&self) -> Address {
        Address::new(self.host.clone(), self.port)
    }
}
