//! Endpoint addressing
//!
//! An address has the form `<scheme>://<host>:<port>` and names exactly one
//! RPC service. Endpoints and consoles both publish one.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Scheme used when rendering addresses
pub const SCHEME: &str = "rrepl";

/// Default host for a session endpoint
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default port for a session endpoint
pub const DEFAULT_PORT: u16 = 9876;

/// Location of an RPC service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    scheme: String,
    host: String,
    port: u16,
}

impl Address {
    /// Create an address using the default scheme
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: SCHEME.to_string(),
            host: host.into(),
            port,
        }
    }

    /// Scheme component
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host component
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port component
    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` form suitable for socket binding and dialing
    pub fn socket_addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Same host and scheme, different port
    pub fn with_port(&self, port: u16) -> Self {
        Self {
            scheme: self.scheme.clone(),
            host: self.host.clone(),
            port,
        }
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.socket_addr())
    }
}

impl FromStr for Address {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ProtocolError::InvalidAddress {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| invalid("missing '://' separator"))?;
        if scheme.is_empty() {
            return Err(invalid("empty scheme"));
        }

        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| invalid("missing port"))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(invalid("empty host"));
        }
        let port = port.parse::<u16>().map_err(|_| invalid("port is not a number"))?;

        Ok(Self {
            scheme: scheme.to_string(),
            host: host.to_string(),
            port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_address_display() {
        assert_eq!(Address::default().to_string(), "rrepl://127.0.0.1:9876");
    }

    #[test]
    fn test_parse_address() {
        let addr: Address = "rrepl://example.internal:4000".parse().unwrap();
        assert_eq!(addr.scheme(), "rrepl");
        assert_eq!(addr.host(), "example.internal");
        assert_eq!(addr.port(), 4000);
        assert_eq!(addr.socket_addr(), "example.internal:4000");
    }

    #[test]
    fn test_parse_ipv6_address() {
        let addr: Address = "rrepl://[::1]:9876".parse().unwrap();
        assert_eq!(addr.host(), "::1");
        assert_eq!(addr.socket_addr(), "[::1]:9876");
        assert_eq!(addr.to_string(), "rrepl://[::1]:9876");
    }

    #[test]
    fn test_parse_rejects_missing_scheme() {
        let result = "localhost:9876".parse::<Address>();
        assert!(matches!(result, Err(ProtocolError::InvalidAddress { .. })));
    }

    #[test]
    fn test_parse_rejects_bad_port() {
        assert!("rrepl://localhost:port".parse::<Address>().is_err());
        assert!("rrepl://localhost".parse::<Address>().is_err());
    }

    #[test]
    fn test_with_port() {
        let addr = Address::new("10.0.0.5", 0).with_port(41000);
        assert_eq!(addr.to_string(), "rrepl://10.0.0.5:41000");
    }
}
