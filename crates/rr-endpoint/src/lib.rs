//! rr-endpoint: the process side of a remote-repl session
//!
//! A host process creates an `Endpoint` at the point it wants to be
//! inspected. The endpoint publishes a session handle, waits for a console
//! to attach, lends the process-wide REPL settings to the session, and runs
//! a REPL engine whose input and output live in the console.

pub mod context;
pub mod endpoint;
pub mod handle;
pub mod input;
pub mod remote;
pub mod repl;
pub mod service;
pub mod shell;

pub use context::{Redirect, SessionContext};
pub use endpoint::{serve, Endpoint, EndpointOptions, EndpointState};
pub use handle::{HandleFields, SessionHandle};
pub use input::InputProxy;
pub use remote::{RemoteObject, ServicePool};
pub use repl::{LineRepl, Repl, ReplIo, ReplOptions};
pub use service::HandleService;
pub use shell::ShellRedirector;
