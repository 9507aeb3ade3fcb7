//! Core trait definitions

mod io;
mod system;

pub use io::{LineSource, MemorySink, OutputSink, StdStream};
pub use system::{shell_command, InheritedSystem, SystemCommand};
