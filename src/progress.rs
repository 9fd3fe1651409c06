//! Per-file progress reporting
//!
//! The packer emits [`ProgressEvent`]s and never touches the terminal.
//! [`ConsoleProgress`] renders them the way the command-line tool shows them:
//! a `path...` notice, an in-place byte counter, and a closing `done.` line.

use std::io::{self, Write};

/// Observable progress of one file copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent<'a> {
    /// The archive accepted the file and copying begins
    Started { path: &'a str },
    /// Cumulative bytes copied so far, after each chunk
    Copied { path: &'a str, bytes: u64 },
    /// The whole file was copied
    Finished { path: &'a str, bytes: u64 },
    /// Copying stopped after `bytes` because of a read or write failure
    Failed { path: &'a str, bytes: u64 },
}

impl ProgressEvent<'_> {
    pub fn path(&self) -> &str {
        match self {
            ProgressEvent::Started { path }
            | ProgressEvent::Copied { path, .. }
            | ProgressEvent::Finished { path, .. }
            | ProgressEvent::Failed { path, .. } => path,
        }
    }
}

/// Receives progress events from the packer
pub trait ProgressObserver {
    fn on_progress(&mut self, event: &ProgressEvent<'_>);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&mut self, _event: &ProgressEvent<'_>) {}
}

/// Renders progress with ANSI save/restore-cursor sequences
pub struct ConsoleProgress<W: Write> {
    out: W,
}

impl ConsoleProgress<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleProgress<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn render(&mut self, event: &ProgressEvent<'_>) -> io::Result<()> {
        let path = event.path();
        match event {
            ProgressEvent::Started { .. } => write!(self.out, "\x1b[s{}...", path)?,
            ProgressEvent::Copied { bytes, .. } => {
                write!(self.out, "\r\x1b[u{}...{} [bytes]", path, bytes)?
            }
            ProgressEvent::Finished { bytes, .. } => {
                writeln!(self.out, "\r\x1b[u{}...{} [bytes] done.", path, bytes)?
            }
            ProgressEvent::Failed { bytes, .. } => {
                writeln!(self.out, "\r\x1b[u{}...{} [bytes] failed.", path, bytes)?
            }
        }
        self.out.flush()
    }
}

impl<W: Write> ProgressObserver for ConsoleProgress<W> {
    fn on_progress(&mut self, event: &ProgressEvent<'_>) {
        // Console output is best effort; a closed stdout must not fail the run.
        let _ = self.render(event);
    }
}
