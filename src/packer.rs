//! Recursive tree-to-archive packing
//!
//! The walk is depth-first and never stops early. Every per-entry failure is
//! recorded and counted, and the walk moves on to the next sibling; only the
//! caller decides what an aggregate failure count means.

use crate::entry::EntryInfo;
use crate::enumerate::{NamePattern, SourcePattern, TreeEnumerator};
use crate::error::{NoaError, Result};
use crate::progress::{ProgressEvent, ProgressObserver};
use crate::sink::{ArchiveSink, DirectoryScope, FileScope};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::{debug, info, warn};

/// Copy buffer size (64 KiB)
pub const CHUNK_SIZE: usize = 0x10000;

/// Why one entry could not be packed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The archive refused to create the directory node; its subtree was skipped
    DirectoryCreateFailed,
    /// The archive could not move back out of a directory
    DirectoryAscendFailed,
    /// The source file could not be opened
    SourceFileOpenFailed,
    /// The archive refused to begin the file
    FileBeginFailed,
    /// Reading the source or writing the archive failed mid-copy
    StreamIoFailed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureKind::DirectoryCreateFailed => "cannot create archive directory",
            FailureKind::DirectoryAscendFailed => "cannot leave archive directory",
            FailureKind::SourceFileOpenFailed => "cannot open source file",
            FailureKind::FileBeginFailed => "cannot start writing",
            FailureKind::StreamIoFailed => "write failed",
        };
        f.write_str(text)
    }
}

/// A recorded per-entry failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFailure {
    /// Archive-relative path of the entry
    pub path: String,
    pub kind: FailureKind,
    pub message: String,
}

impl fmt::Display for EntryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.path, self.kind, self.message)
    }
}

/// Outcome of one packing run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackReport {
    pub failures: Vec<EntryFailure>,
    pub files: u64,
    pub directories: u64,
    pub bytes: u64,
}

impl PackReport {
    pub fn error_count(&self) -> usize {
        self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Depth-first packer driving an [`ArchiveSink`]
pub struct Packer<'a, P: ProgressObserver + ?Sized> {
    enumerator: &'a TreeEnumerator,
    observer: &'a mut P,
    buffer: Vec<u8>,
    report: PackReport,
}

impl<'a, P: ProgressObserver + ?Sized> Packer<'a, P> {
    pub fn new(enumerator: &'a TreeEnumerator, observer: &'a mut P) -> Self {
        Self {
            enumerator,
            observer,
            buffer: vec![0u8; CHUNK_SIZE],
            report: PackReport::default(),
        }
    }

    pub fn report(&self) -> &PackReport {
        &self.report
    }

    pub fn into_report(self) -> PackReport {
        self.report
    }

    /// Pack `entries` (listed from `source_dir`) into the sink's current
    /// directory, whose archive path is `archive_dir`. Returns the number of
    /// failures in this directory and everything below it.
    pub fn pack_directory<S: ArchiveSink + ?Sized>(
        &mut self,
        sink: &mut S,
        source_dir: &Path,
        archive_dir: &str,
        entries: &[EntryInfo],
    ) -> usize {
        let mut errors = 0;
        for entry in entries {
            let source_path = source_dir.join(&entry.name);
            let archive_path = archive_join(archive_dir, &entry.name);
            errors += if entry.is_dir() {
                self.pack_subdirectory(sink, entry, &source_path, &archive_path)
            } else {
                self.pack_file(sink, entry, &source_path, &archive_path)
            };
        }
        errors
    }

    fn pack_subdirectory<S: ArchiveSink + ?Sized>(
        &mut self,
        sink: &mut S,
        entry: &EntryInfo,
        source_path: &Path,
        archive_path: &str,
    ) -> usize {
        let children = self.enumerator.enumerate(source_path, &NamePattern::all());

        let mut scope = match DirectoryScope::begin(sink, &entry.name, &children) {
            Ok(scope) => scope,
            Err(e) => return self.fail(archive_path, FailureKind::DirectoryCreateFailed, e),
        };
        debug!("Packing directory {} ({} entries)", archive_path, children.len());
        self.report.directories += 1;

        let mut errors = self.pack_directory(scope.sink(), source_path, archive_path, &children);
        if let Err(e) = scope.end() {
            errors += self.fail(archive_path, FailureKind::DirectoryAscendFailed, e);
        }
        errors
    }

    fn pack_file<S: ArchiveSink + ?Sized>(
        &mut self,
        sink: &mut S,
        entry: &EntryInfo,
        source_path: &Path,
        archive_path: &str,
    ) -> usize {
        let mut source = match File::open(source_path) {
            Ok(source) => source,
            Err(e) => {
                return self.fail(archive_path, FailureKind::SourceFileOpenFailed, NoaError::Io(e))
            }
        };

        let mut scope = match FileScope::begin(sink, &entry.name, Some(entry)) {
            Ok(scope) => scope,
            Err(e) => return self.fail(archive_path, FailureKind::FileBeginFailed, e),
        };
        self.observer
            .on_progress(&ProgressEvent::Started { path: archive_path });

        let mut total = 0u64;
        let copied = loop {
            let read = match source.read(&mut self.buffer) {
                Ok(0) => break Ok(()),
                Ok(read) => read,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => break Err(NoaError::Io(e)),
            };
            if let Err(e) = scope.write_all(&self.buffer[..read]) {
                break Err(e);
            }
            total += read as u64;
            self.observer.on_progress(&ProgressEvent::Copied {
                path: archive_path,
                bytes: total,
            });
        };

        // The scope ascends exactly once: explicitly here, or on drop when
        // the copy already failed.
        let result = copied.and_then(|()| scope.end());
        match result {
            Ok(()) => {
                self.observer.on_progress(&ProgressEvent::Finished {
                    path: archive_path,
                    bytes: total,
                });
                self.report.files += 1;
                self.report.bytes += total;
                0
            }
            Err(e) => {
                self.observer.on_progress(&ProgressEvent::Failed {
                    path: archive_path,
                    bytes: total,
                });
                self.fail(archive_path, FailureKind::StreamIoFailed, e)
            }
        }
    }

    fn fail(&mut self, path: &str, kind: FailureKind, error: NoaError) -> usize {
        let failure = EntryFailure {
            path: path.to_string(),
            kind,
            message: error.to_string(),
        };
        warn!("{}", failure);
        self.report.failures.push(failure);
        1
    }
}

/// Archive paths always use `/`
fn archive_join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Enumerate `source`, initialize the archive, pack everything and close it
///
/// Failing to initialize or close the archive is fatal; everything in
/// between is recorded in the returned report.
pub fn pack_tree<S, P>(
    sink: &mut S,
    enumerator: &TreeEnumerator,
    source: &SourcePattern,
    observer: &mut P,
) -> Result<PackReport>
where
    S: ArchiveSink + ?Sized,
    P: ProgressObserver + ?Sized,
{
    let entries = enumerator.enumerate_source(source);
    info!(
        "Packing {} top-level entries from {} ({})",
        entries.len(),
        source.directory.display(),
        source.pattern.as_str()
    );

    sink.create_archive(&entries)
        .map_err(|e| NoaError::ArchiveInitFailed(e.to_string()))?;

    let mut packer = Packer::new(enumerator, observer);
    let errors = packer.pack_directory(sink, &source.directory, "", &entries);

    sink.close()
        .map_err(|e| NoaError::ArchiveFinalizeFailed(e.to_string()))?;

    let report = packer.into_report();
    info!(
        "Packed {} files, {} directories, {} bytes, {} errors",
        report.files, report.directories, report.bytes, errors
    );
    Ok(report)
}
