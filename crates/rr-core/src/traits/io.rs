//! I/O abstractions shared by REPL engines and the session proxies

use std::io;
use std::io::IsTerminal;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rr_protocol::ReadlineCapability;
use tokio::io::AsyncWriteExt;

/// Something a REPL can read lines from
#[async_trait]
pub trait LineSource: Send + Sync {
    /// Calling convention of `read_line`, `None` if the source cannot read lines
    fn readline_capability(&self) -> Option<ReadlineCapability>;

    /// Read one line. `prompt` is only passed to prompt-aware sources.
    ///
    /// Returns `Ok(None)` at end of input.
    async fn read_line(&self, prompt: Option<&str>) -> io::Result<Option<String>>;

    /// Whether completion candidates can be installed
    fn supports_completion(&self) -> bool {
        false
    }

    /// Install completion candidates
    async fn set_completion(&self, _candidates: Vec<String>) -> io::Result<()> {
        Ok(())
    }

    /// Currently installed completion candidates
    async fn completion(&self) -> io::Result<Option<Vec<String>>> {
        Ok(None)
    }
}

/// Something a REPL or the host process can write output to
#[async_trait]
pub trait OutputSink: Send + Sync {
    /// Write raw bytes
    async fn write(&self, data: &[u8]) -> io::Result<()>;

    /// Write text as-is
    async fn print(&self, text: &str) -> io::Result<()> {
        self.write(text.as_bytes()).await
    }

    /// Write a line, adding a trailing newline if missing
    async fn puts(&self, line: &str) -> io::Result<()> {
        if line.ends_with('\n') {
            self.write(line.as_bytes()).await
        } else {
            let mut buf = String::with_capacity(line.len() + 1);
            buf.push_str(line);
            buf.push('\n');
            self.write(buf.as_bytes()).await
        }
    }

    /// Whether the sink is an interactive terminal
    fn is_tty(&self) -> bool {
        false
    }
}

/// The process's own standard streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdStream {
    Stdout,
    Stderr,
}

#[async_trait]
impl OutputSink for StdStream {
    async fn write(&self, data: &[u8]) -> io::Result<()> {
        match self {
            StdStream::Stdout => {
                let mut out = tokio::io::stdout();
                out.write_all(data).await?;
                out.flush().await
            }
            StdStream::Stderr => {
                let mut err = tokio::io::stderr();
                err.write_all(data).await?;
                err.flush().await
            }
        }
    }

    fn is_tty(&self) -> bool {
        match self {
            StdStream::Stdout => io::stdout().is_terminal(),
            StdStream::Stderr => io::stderr().is_terminal(),
        }
    }
}

/// Collects everything written to it in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded
    pub fn contents(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

#[async_trait]
impl OutputSink for MemorySink {
    async fn write(&self, data: &[u8]) -> io::Result<()> {
        self.buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(data);
        Ok(())
    }
}
