//! rr-console: the console side of a remote-repl session
//!
//! The console lends its terminal to a REPL running inside another process.
//! Its devices stay local behind `LocalIoProxy` objects published on a
//! callback service; the endpoint only ever receives references to them.

pub mod connector;
pub mod editor;
pub mod net;
pub mod proxy;
pub mod service;

pub use connector::{Connector, Devices, Dialer, HandleLink, TcpDialer};
pub use editor::LineEditor;
pub use proxy::{BufReadInput, LineReader, LocalIoProxy};
pub use service::{ObjectTable, Parker};
