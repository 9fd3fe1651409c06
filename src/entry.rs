//! Entry descriptors produced by tree enumeration

use std::collections::HashSet;
use std::time::SystemTime;

/// Extensions of formats that are already compressed or are containers
/// themselves. Files with these extensions are stored raw.
pub const IGNORE_COMPRESS_EXTENSIONS: [&str; 14] = [
    "eri", "mei", "mio", "noa", "png", "jpg", "jpeg", "avi", "mpg", "mpeg", "mp3", "mp4", "wma",
    "wmv",
];

/// Per-file storage encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Stored verbatim
    Raw,
    /// Content transform (compression) applied by the archive writer
    Transformed,
}

/// Read-only set of lowercase extensions whose files are stored raw
#[derive(Debug, Clone)]
pub struct IgnoreExtensionSet {
    extensions: HashSet<&'static str>,
}

impl IgnoreExtensionSet {
    /// The fixed set compiled into the tool
    pub fn builtin() -> Self {
        Self {
            extensions: IGNORE_COMPRESS_EXTENSIONS.iter().copied().collect(),
        }
    }

    /// Membership test for an extension without the dot (case-insensitive)
    pub fn contains(&self, extension: &str) -> bool {
        self.extensions.contains(extension.to_lowercase().as_str())
    }

    /// Decide the encoding of a file from its name
    ///
    /// The extension is whatever follows the last `.`, so a dotfile such as
    /// `.png` counts as a `png`.
    pub fn classify(&self, file_name: &str) -> Encoding {
        match file_name.rsplit_once('.') {
            Some((_, ext)) if self.contains(ext) => Encoding::Raw,
            _ => Encoding::Transformed,
        }
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

impl Default for IgnoreExtensionSet {
    fn default() -> Self {
        Self::builtin()
    }
}

/// What an entry is, with the fields that only make sense for files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File { size: u64, encoding: Encoding },
}

/// One filesystem entry discovered during enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub name: String,
    pub kind: EntryKind,
    pub modified_at: SystemTime,
}

impl EntryInfo {
    pub fn directory(name: impl Into<String>, modified_at: SystemTime) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            modified_at,
        }
    }

    pub fn file(
        name: impl Into<String>,
        modified_at: SystemTime,
        size: u64,
        encoding: Encoding,
    ) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File { size, encoding },
            modified_at,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }

    /// Byte length for files, zero for directories
    pub fn size(&self) -> u64 {
        match self.kind {
            EntryKind::File { size, .. } => size,
            EntryKind::Directory => 0,
        }
    }

    /// Storage encoding for files, `None` for directories
    pub fn encoding(&self) -> Option<Encoding> {
        match self.kind {
            EntryKind::File { encoding, .. } => Some(encoding),
            EntryKind::Directory => None,
        }
    }
}
