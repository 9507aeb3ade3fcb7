//! Shell escapes whose output follows the session
//!
//! While a session is active, shell commands typed into the REPL must print
//! on the console, not on the host's terminal. The redirector pipes the
//! child's stdout and stderr and copies whatever arrives on either stream
//! into the session output as it is produced.

use std::future;
use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use rr_core::{shell_command, OutputSink, SystemCommand};

/// Largest chunk copied per read, so one stream cannot starve the other
pub const CHUNK_SIZE: usize = 1024;

/// System-command hook that streams child output into the session output
#[derive(Debug, Clone, Default)]
pub struct ShellRedirector {
    shell: Option<String>,
}

impl ShellRedirector {
    /// `shell` overrides the platform shell used to run commands
    pub fn new(shell: Option<String>) -> Self {
        Self { shell }
    }
}

#[async_trait]
impl SystemCommand for ShellRedirector {
    async fn run(&self, output: &dyn OutputSink, command: &str) -> io::Result<()> {
        let spawned = shell_command(self.shell.as_deref(), command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                tracing::debug!("Failed to spawn '{}': {}", command, e);
                return report_failure(output, command).await;
            }
        };

        // The child never gets interactive input
        drop(child.stdin.take());

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let mut out_buf = [0u8; CHUNK_SIZE];
        let mut err_buf = [0u8; CHUNK_SIZE];

        while stdout.is_some() || stderr.is_some() {
            tokio::select! {
                read = read_chunk(&mut stdout, &mut out_buf) => match read? {
                    0 => stdout = None,
                    n => output.write(&out_buf[..n]).await?,
                },
                read = read_chunk(&mut stderr, &mut err_buf) => match read? {
                    0 => stderr = None,
                    n => output.write(&err_buf[..n]).await?,
                },
            }
        }

        let status = child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            tracing::debug!("'{}' exited with {}", command, status);
            report_failure(output, command).await
        }
    }
}

/// Read from a stream that is still open; a closed stream never completes
async fn read_chunk<R>(stream: &mut Option<R>, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    match stream {
        Some(stream) => stream.read(buf).await,
        None => future::pending().await,
    }
}

async fn report_failure(output: &dyn OutputSink, command: &str) -> io::Result<()> {
    output
        .puts(&format!("Error while executing command: {}", command))
        .await
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use rr_core::MemorySink;

    async fn run(command: &str) -> String {
        let sink = MemorySink::new();
        ShellRedirector::default().run(&sink, command).await.unwrap();
        sink.contents()
    }

    #[tokio::test]
    async fn test_success_adds_nothing() {
        assert_eq!(run("true").await, "");
    }

    #[tokio::test]
    async fn test_failure_appends_one_line() {
        assert_eq!(run("false").await, "Error while executing command: false\n");
    }

    #[tokio::test]
    async fn test_both_streams_are_copied() {
        let out = run("echo to-out; echo to-err 1>&2").await;
        assert!(out.contains("to-out\n"));
        assert!(out.contains("to-err\n"));
    }

    #[tokio::test]
    async fn test_output_precedes_failure_line() {
        let out = run("echo partial; exit 3").await;
        assert_eq!(
            out,
            "partial\nError while executing command: echo partial; exit 3\n"
        );
    }

    #[tokio::test]
    async fn test_output_larger_than_one_chunk() {
        let out = run("head -c 5000 /dev/zero | tr '\\0' x").await;
        assert_eq!(out.len(), 5000);
        assert!(out.bytes().all(|b| b == b'x'));
    }

    #[tokio::test]
    async fn test_stdin_is_closed() {
        // `cat` would block forever on an open stdin
        let out = tokio::time::timeout(std::time::Duration::from_secs(5), run("cat"))
            .await
            .unwrap();
        assert_eq!(out, "");
    }

    #[tokio::test]
    async fn test_spawn_failure_reported() {
        let sink = MemorySink::new();
        ShellRedirector::new(Some("/nonexistent/shell".into()))
            .run(&sink, "ls")
            .await
            .unwrap();
        assert_eq!(
            sink.contents(),
            "Error while executing command: ls\n"
        );
    }
}
