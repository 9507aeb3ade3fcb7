//! Object identity and references
//!
//! A service hosts a small table of objects keyed by `ObjectId`. The only
//! thing that crosses the connection is a `RemoteRef`: where the object
//! lives and what it is able to do.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::address::Address;

/// Identifier for an object hosted by a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// Create a new object ID
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// The session handle published by an endpoint
    pub const HANDLE: ObjectId = ObjectId(0);
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object-{}", self.0)
    }
}

impl From<u32> for ObjectId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Calling convention of an object's readline operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadlineCapability {
    /// Accepts the prompt and renders it itself
    PromptAware,
    /// Ignores any prompt; the caller has to display it
    PromptBlind,
}

impl ReadlineCapability {
    /// Resolve an advertised capability.
    ///
    /// An object with no readline operation at all is treated as prompt-blind.
    pub fn resolve(advertised: Option<Self>) -> Self {
        advertised.unwrap_or(Self::PromptBlind)
    }

    pub fn takes_prompt(&self) -> bool {
        matches!(self, Self::PromptAware)
    }
}

/// Fields of a session handle that a console may assign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandleField {
    Input,
    Output,
    Thread,
    Stdout,
    Stderr,
}

impl fmt::Display for HandleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Thread => "thread",
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        };
        f.write_str(name)
    }
}

/// Reference to an object living in another process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRef {
    /// Service hosting the object
    pub service: Address,
    /// Object within that service
    pub object: ObjectId,
    /// Readline calling convention, `None` if the object cannot read lines
    pub readline: Option<ReadlineCapability>,
    /// Whether the object accepts completion candidates
    pub completion: bool,
}

impl RemoteRef {
    /// Reference to an object with no optional capabilities
    pub fn new(service: Address, object: ObjectId) -> Self {
        Self {
            service,
            object,
            readline: None,
            completion: false,
        }
    }

    /// Advertise a readline calling convention
    pub fn with_readline(mut self, capability: ReadlineCapability) -> Self {
        self.readline = Some(capability);
        self
    }

    /// Advertise completion support
    pub fn with_completion(mut self, supported: bool) -> Self {
        self.completion = supported;
        self
    }
}

impl fmt::Display for RemoteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.service, self.object.0)
    }
}
