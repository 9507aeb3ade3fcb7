//! Line editor device backed by rustyline
//!
//! This is the console's canonical line-editing facility: it always renders
//! the prompt itself, records history, and completes from the candidates
//! the remote REPL installs.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Config, Context, Editor, Helper};

/// Completes the word under the cursor from a shared candidate list
#[derive(Default)]
pub struct CandidateHelper {
    candidates: Arc<RwLock<Vec<String>>>,
}

impl CandidateHelper {
    /// Start of the word ending at `pos` and the candidates it prefixes
    fn candidates_for(&self, line: &str, pos: usize) -> (usize, Vec<String>) {
        let head = &line[..pos];
        let start = head
            .rfind(|c: char| c.is_whitespace())
            .map_or(0, |i| i + 1);
        let word = &head[start..];

        let candidates = self.candidates.read().unwrap_or_else(|e| e.into_inner());
        let matches = candidates
            .iter()
            .filter(|c| c.starts_with(word))
            .cloned()
            .collect();
        (start, matches)
    }
}

impl Helper for CandidateHelper {}

impl Completer for CandidateHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _: &Context<'_>,
    ) -> Result<(usize, Vec<Pair>), ReadlineError> {
        let (start, matches) = self.candidates_for(line, pos);
        let pairs = matches
            .into_iter()
            .map(|word| Pair {
                display: word.clone(),
                replacement: word,
            })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for CandidateHelper {
    type Hint = String;
}

impl Highlighter for CandidateHelper {}

impl Validator for CandidateHelper {}

/// Interactive terminal input with history and completion
pub struct LineEditor {
    editor: Editor<CandidateHelper, DefaultHistory>,
    candidates: Arc<RwLock<Vec<String>>>,
    completion_set: bool,
    history_file: Option<PathBuf>,
}

impl LineEditor {
    /// Create an editor; history is loaded from and saved to `history_file`
    pub fn new(history_file: Option<PathBuf>) -> Result<Self, ReadlineError> {
        let config = Config::builder()
            .completion_type(CompletionType::List)
            .auto_add_history(false)
            .build();
        let mut editor = Editor::<CandidateHelper, DefaultHistory>::with_config(config)?;

        let helper = CandidateHelper::default();
        let candidates = Arc::clone(&helper.candidates);
        editor.set_helper(Some(helper));

        if let Some(path) = &history_file {
            if path.exists() {
                if let Err(e) = editor.load_history(path) {
                    tracing::warn!("Failed to load history from {:?}: {}", path, e);
                }
            }
        }

        Ok(Self {
            editor,
            candidates,
            completion_set: false,
            history_file,
        })
    }

    /// Read one line. Ctrl-C yields an empty line, Ctrl-D ends input.
    pub fn readline(&mut self, prompt: &str) -> io::Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    self.editor
                        .add_history_entry(line.as_str())
                        .map_err(into_io)?;
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
            Err(ReadlineError::Eof) => Ok(None),
            Err(e) => Err(into_io(e)),
        }
    }

    pub fn set_completion(&mut self, candidates: Vec<String>) {
        *self.candidates.write().unwrap_or_else(|e| e.into_inner()) = candidates;
        self.completion_set = true;
    }

    /// Installed candidates, `None` until the remote side installs some
    pub fn completion(&self) -> Option<Vec<String>> {
        self.completion_set
            .then(|| self.candidates.read().unwrap_or_else(|e| e.into_inner()).clone())
    }

    pub fn history_file(&self) -> Option<&Path> {
        self.history_file.as_deref()
    }

    /// Write history to the history file, if there is one
    pub fn save_history(&mut self) -> io::Result<()> {
        let Some(path) = self.history_file.clone() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.editor.save_history(&path).map_err(into_io)
    }
}

impl Drop for LineEditor {
    fn drop(&mut self) {
        if let Err(e) = self.save_history() {
            tracing::warn!("Failed to save history: {}", e);
        }
    }
}

fn into_io(err: ReadlineError) -> io::Error {
    match err {
        ReadlineError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::Other, other),
    }
}
