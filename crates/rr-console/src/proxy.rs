//! Local-execution I/O proxies
//!
//! Each proxy owns one local device. The remote REPL only ever holds a
//! reference to the proxy; every readline or write it makes is executed
//! here, against the real terminal or file descriptor.

use std::io::{self, BufRead, Write};

use rr_protocol::{Address, ObjectId, ReadlineCapability, RemoteRef};

use crate::editor::LineEditor;

/// A plain line reader that is not the line editor
pub trait LineReader: Send {
    /// Calling convention of `read_line`
    fn capability(&self) -> ReadlineCapability {
        ReadlineCapability::PromptBlind
    }

    /// Read one line without its terminator; `None` at end of input.
    ///
    /// `prompt` is only passed to prompt-aware readers.
    fn read_line(&mut self, prompt: Option<&str>) -> io::Result<Option<String>>;
}

/// Prompt-blind reader over any buffered input
pub struct BufReadInput<R> {
    reader: R,
}

impl<R: BufRead + Send> BufReadInput<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead + Send> LineReader for BufReadInput<R> {
    fn read_line(&mut self, _prompt: Option<&str>) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }
}

/// The device a proxy executes against
pub enum Device {
    Editor(LineEditor),
    Reader(Box<dyn LineReader>),
    Writer(Box<dyn Write + Send>),
}

/// Wraps one local device; only its reference leaves the process
pub struct LocalIoProxy {
    device: Device,
    /// Where prompts for prompt-blind readers are shown
    prompt_echo: Option<Box<dyn Write + Send>>,
}

impl LocalIoProxy {
    pub fn editor(editor: LineEditor) -> Self {
        Self {
            device: Device::Editor(editor),
            prompt_echo: None,
        }
    }

    /// Reader whose prompts, if it is prompt-blind, are written to `prompt_echo`
    pub fn reader<L>(reader: L, prompt_echo: Option<Box<dyn Write + Send>>) -> Self
    where
        L: LineReader + 'static,
    {
        Self {
            device: Device::Reader(Box::new(reader)),
            prompt_echo,
        }
    }

    pub fn writer<W>(writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            device: Device::Writer(Box::new(writer)),
            prompt_echo: None,
        }
    }

    /// How the wrapped device reads lines, `None` if it cannot
    pub fn device_capability(&self) -> Option<ReadlineCapability> {
        match &self.device {
            Device::Editor(_) => Some(ReadlineCapability::PromptAware),
            Device::Reader(reader) => Some(reader.capability()),
            Device::Writer(_) => None,
        }
    }

    pub fn supports_completion(&self) -> bool {
        matches!(self.device, Device::Editor(_))
    }

    /// Reference to this proxy as object `id` of `service`.
    ///
    /// Readable proxies advertise themselves as prompt-aware: the proxy
    /// always accepts a prompt and deals with the device's own convention.
    pub fn remote_ref(&self, service: &Address, id: ObjectId) -> RemoteRef {
        let mut reference = RemoteRef::new(service.clone(), id)
            .with_completion(self.supports_completion());
        if self.device_capability().is_some() {
            reference = reference.with_readline(ReadlineCapability::PromptAware);
        }
        reference
    }

    pub fn readline(&mut self, prompt: Option<&str>) -> io::Result<Option<String>> {
        match &mut self.device {
            Device::Editor(editor) => editor.readline(prompt.unwrap_or_default()),
            Device::Reader(reader) => match reader.capability() {
                ReadlineCapability::PromptAware => reader.read_line(prompt),
                ReadlineCapability::PromptBlind => {
                    if let (Some(prompt), Some(echo)) = (prompt, self.prompt_echo.as_mut()) {
                        echo.write_all(prompt.as_bytes())?;
                        echo.flush()?;
                    }
                    reader.read_line(None)
                }
            },
            Device::Writer(_) => Err(unsupported("readline")),
        }
    }

    pub fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let writer = self.writer_mut("write")?;
        writer.write_all(data)?;
        writer.flush()
    }

    pub fn print(&mut self, parts: &[String]) -> io::Result<()> {
        let writer = self.writer_mut("print")?;
        for part in parts {
            writer.write_all(part.as_bytes())?;
        }
        writer.flush()
    }

    /// Text already formatted by the caller
    pub fn printf(&mut self, text: &str) -> io::Result<()> {
        self.write(text.as_bytes())
    }

    pub fn puts(&mut self, lines: &[String]) -> io::Result<()> {
        let writer = self.writer_mut("puts")?;
        if lines.is_empty() {
            writer.write_all(b"\n")?;
        }
        for line in lines {
            writer.write_all(line.as_bytes())?;
            if !line.ends_with('\n') {
                writer.write_all(b"\n")?;
            }
        }
        writer.flush()
    }

    /// Install completion candidates; ignored by devices without completion
    pub fn set_completion(&mut self, candidates: Vec<String>) {
        if let Device::Editor(editor) = &mut self.device {
            editor.set_completion(candidates);
        }
    }

    pub fn completion(&self) -> Option<Vec<String>> {
        match &self.device {
            Device::Editor(editor) => editor.completion(),
            _ => None,
        }
    }

    /// A proxied device never claims to be a terminal
    pub fn is_tty(&self) -> bool {
        false
    }

    fn writer_mut(&mut self, op: &str) -> io::Result<&mut (dyn Write + Send)> {
        match &mut self.device {
            Device::Writer(writer) => Ok(writer.as_mut()),
            _ => Err(unsupported(op)),
        }
    }
}

fn unsupported(op: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("{} is not supported by this device", op),
    )
}
