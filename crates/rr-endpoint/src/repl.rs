//! Boundary to the REPL engine run inside a session
//!
//! An engine receives the target, an input proxy and an output, the shared
//! settings, and any caller options. It runs until the user leaves, input
//! ends, or it fails. `LineRepl` is a small engine good enough for hosts
//! that only need to evaluate one-line commands.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use rr_core::{OutputSink, ReplSettings};

use crate::input::InputProxy;

/// Devices a REPL engine reads from and writes to
#[derive(Clone)]
pub struct ReplIo {
    pub input: InputProxy,
    pub output: Arc<dyn OutputSink>,
}

/// Caller-supplied engine options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplOptions {
    pub prompt: String,
    /// Engine-specific settings passed through untouched
    pub extra: BTreeMap<String, String>,
}

impl Default for ReplOptions {
    fn default() -> Self {
        Self {
            prompt: ">> ".to_string(),
            extra: BTreeMap::new(),
        }
    }
}

/// An interactive loop over `target`
#[async_trait]
pub trait Repl<T: ?Sized + Sync>: Send {
    async fn start(
        &mut self,
        target: &T,
        io: ReplIo,
        settings: Arc<ReplSettings>,
        options: &ReplOptions,
    ) -> anyhow::Result<()>;
}

type Evaluator<T> = Box<dyn Fn(&T, &str) -> anyhow::Result<String> + Send + Sync>;

/// Line-at-a-time engine.
///
/// Understands `exit`/`quit`, `.<command>` shell escapes through the
/// settings' system hook, and `puts <text>` which writes to the host
/// process's stdout. Everything else goes to the evaluator.
pub struct LineRepl<T> {
    evaluate: Evaluator<T>,
    completions: Vec<String>,
}

const BUILTINS: &[&str] = &["exit", "quit", "puts"];

impl<T: 'static> LineRepl<T> {
    pub fn new<F>(evaluate: F) -> Self
    where
        F: Fn(&T, &str) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Self {
            evaluate: Box::new(evaluate),
            completions: BUILTINS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Extra words offered for completion
    pub fn with_completions<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.completions.extend(words.into_iter().map(Into::into));
        self
    }
}

#[async_trait]
impl<T: Sync + 'static> Repl<T> for LineRepl<T> {
    async fn start(
        &mut self,
        target: &T,
        io: ReplIo,
        settings: Arc<ReplSettings>,
        options: &ReplOptions,
    ) -> anyhow::Result<()> {
        io.input.set_completion(self.completions.clone()).await?;

        loop {
            let line = match io.input.readline(&options.prompt).await? {
                Some(line) => line,
                None => break,
            };
            let line = line.trim();

            match line {
                "" => continue,
                "exit" | "quit" => break,
                _ => {}
            }

            if let Some(command) = line.strip_prefix('.') {
                settings.system().run(io.output.as_ref(), command).await?;
            } else if let Some(text) = line.strip_prefix("puts ") {
                settings.stdout().puts(text).await?;
            } else {
                match (self.evaluate)(target, line) {
                    Ok(value) => io.output.puts(&format!("=> {}", value)).await?,
                    Err(e) => io.output.puts(&format!("Error: {}", e)).await?,
                }
            }
        }

        Ok(())
    }
}
