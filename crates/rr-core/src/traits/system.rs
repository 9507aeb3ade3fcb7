//! System-command hook used by REPL engines for shell escapes

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::io::OutputSink;

/// Runs a shell command on behalf of a REPL
#[async_trait]
pub trait SystemCommand: Send + Sync {
    /// Run `command`, reporting anything user-visible to `output`
    async fn run(&self, output: &dyn OutputSink, command: &str) -> io::Result<()>;
}

/// Build a command that runs `command` through a shell
///
/// `shell` overrides the platform default (`sh -c`, or `cmd /C` on Windows).
pub fn shell_command(shell: Option<&str>, command: &str) -> Command {
    let (program, flag) = match shell {
        Some(program) if cfg!(windows) => (program, "/C"),
        Some(program) => (program, "-c"),
        None if cfg!(windows) => ("cmd", "/C"),
        None => ("sh", "-c"),
    };

    let mut cmd = Command::new(program);
    cmd.arg(flag).arg(command);
    cmd
}

/// Default hook: the command shares the host process's own stdio
#[derive(Debug, Clone, Default)]
pub struct InheritedSystem {
    shell: Option<String>,
}

impl InheritedSystem {
    pub fn new(shell: Option<String>) -> Self {
        Self { shell }
    }
}

#[async_trait]
impl SystemCommand for InheritedSystem {
    async fn run(&self, output: &dyn OutputSink, command: &str) -> io::Result<()> {
        let status = shell_command(self.shell.as_deref(), command)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => {
                tracing::debug!("System command exited with {}", status);
                output
                    .puts(&format!("Error while executing command: {}", command))
                    .await
            }
            Err(e) => {
                tracing::debug!("Failed to spawn system command: {}", e);
                output
                    .puts(&format!("Error while executing command: {}", command))
                    .await
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::traits::io::MemorySink;

    #[tokio::test]
    async fn test_inherited_success_is_silent() {
        let sink = MemorySink::new();
        InheritedSystem::default().run(&sink, "true").await.unwrap();
        assert_eq!(sink.contents(), "");
    }

    #[tokio::test]
    async fn test_inherited_failure_reports_command() {
        let sink = MemorySink::new();
        InheritedSystem::default().run(&sink, "false").await.unwrap();
        assert_eq!(sink.contents(), "Error while executing command: false\n");
    }
}
