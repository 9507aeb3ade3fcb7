//! rr-core: Core abstractions and plumbing for remote-repl
//!
//! This crate provides the error taxonomy, configuration files, the I/O and
//! system-command traits REPL engines are written against, the process-wide
//! `ReplSettings`, and the request/response RPC layer both halves of a
//! session are built on.

pub mod config;
pub mod error;
pub mod rpc;
pub mod settings;
pub mod traits;

pub use error::{ConfigError, ConnectionError, RpcError, RrError, SessionError};
pub use rpc::{RpcClient, RpcHandler, RpcServer, ServiceGuard};
pub use settings::{ReplSettings, SettingsSnapshot};
pub use traits::{
    shell_command, InheritedSystem, LineSource, MemorySink, OutputSink, StdStream, SystemCommand,
};
