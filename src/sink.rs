//! The archive-writer protocol driven by the packer
//!
//! An [`ArchiveSink`] owns the container format and a single cursor that
//! moves down into directories and files and back up again. Callers must keep
//! the cursor balanced: every successful [`ArchiveSink::create_directory`] is
//! matched by exactly one [`ArchiveSink::ascend_directory`], every successful
//! [`ArchiveSink::descend_file`] by exactly one [`ArchiveSink::ascend_file`].
//! [`DirectoryScope`] and [`FileScope`] enforce that pairing on every exit
//! path, including early returns and mid-stream failures.

use crate::entry::EntryInfo;
use crate::error::{NoaError, Result};
use std::io;
use tracing::warn;

/// Write-only hierarchical archive container
pub trait ArchiveSink {
    /// Initialize the container with the root entry set
    fn create_archive(&mut self, entries: &[EntryInfo]) -> Result<()>;

    /// Register a directory under the cursor and move the cursor into it.
    /// `entries` are the directory's children, known before their contents
    /// are streamed.
    fn create_directory(&mut self, name: &str, entries: &[EntryInfo]) -> Result<()>;

    /// Move the cursor back to the parent directory
    fn ascend_directory(&mut self) -> Result<()>;

    /// Begin writing a file under the cursor. With `streaming` set, content
    /// arrives through subsequent [`ArchiveSink::write`] calls.
    fn descend_file(&mut self, name: &str, info: Option<&EntryInfo>, streaming: bool)
        -> Result<()>;

    /// Append bytes to the open file, returning how many were accepted
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Finalize the open file and return the cursor to its directory
    fn ascend_file(&mut self) -> Result<()>;

    /// Finalize and release the container. Call exactly once.
    fn close(&mut self) -> Result<()>;
}

impl<S: ArchiveSink + ?Sized> ArchiveSink for &mut S {
    fn create_archive(&mut self, entries: &[EntryInfo]) -> Result<()> {
        (**self).create_archive(entries)
    }

    fn create_directory(&mut self, name: &str, entries: &[EntryInfo]) -> Result<()> {
        (**self).create_directory(name, entries)
    }

    fn ascend_directory(&mut self) -> Result<()> {
        (**self).ascend_directory()
    }

    fn descend_file(
        &mut self,
        name: &str,
        info: Option<&EntryInfo>,
        streaming: bool,
    ) -> Result<()> {
        (**self).descend_file(name, info, streaming)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        (**self).write(buf)
    }

    fn ascend_file(&mut self) -> Result<()> {
        (**self).ascend_file()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// An open archive directory; ascends on [`DirectoryScope::end`] or drop
pub struct DirectoryScope<'a, S: ArchiveSink + ?Sized> {
    sink: &'a mut S,
    open: bool,
}

impl<'a, S: ArchiveSink + ?Sized> DirectoryScope<'a, S> {
    /// Create the directory and descend into it. Nothing needs undoing if
    /// this fails.
    pub fn begin(sink: &'a mut S, name: &str, entries: &[EntryInfo]) -> Result<Self> {
        sink.create_directory(name, entries)?;
        Ok(Self { sink, open: true })
    }

    /// The sink, positioned inside this directory
    pub fn sink(&mut self) -> &mut S {
        &mut *self.sink
    }

    pub fn end(mut self) -> Result<()> {
        self.open = false;
        self.sink.ascend_directory()
    }
}

impl<S: ArchiveSink + ?Sized> Drop for DirectoryScope<'_, S> {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.sink.ascend_directory() {
                warn!("Failed to ascend archive directory: {}", e);
            }
        }
    }
}

/// An open archive file; ascends on [`FileScope::end`] or drop
pub struct FileScope<'a, S: ArchiveSink + ?Sized> {
    sink: &'a mut S,
    open: bool,
}

impl<'a, S: ArchiveSink + ?Sized> FileScope<'a, S> {
    /// Begin a streaming file write
    pub fn begin(sink: &'a mut S, name: &str, info: Option<&EntryInfo>) -> Result<Self> {
        sink.descend_file(name, info, true)?;
        Ok(Self { sink, open: true })
    }

    /// Hand the whole buffer to the sink, looping over partial acceptance.
    /// A sink that accepts nothing is a write failure.
    pub fn write_all(&mut self, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            let accepted = self.sink.write(buf)?;
            if accepted == 0 {
                return Err(NoaError::Io(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "archive accepted no bytes",
                )));
            }
            buf = &buf[accepted.min(buf.len())..];
        }
        Ok(())
    }

    pub fn end(mut self) -> Result<()> {
        self.open = false;
        self.sink.ascend_file()
    }
}

impl<S: ArchiveSink + ?Sized> Drop for FileScope<'_, S> {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.sink.ascend_file() {
                warn!("Failed to finish archive file: {}", e);
            }
        }
    }
}
