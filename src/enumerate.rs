//! Directory enumeration with glob-style name filtering
//!
//! The enumerator lists exactly one directory level. Recursion is driven by
//! the packer, which re-enumerates every subdirectory with [`NamePattern::all`]
//! right before registering it in the archive.
//!
//! Listing failures are not errors here: a directory that cannot be read
//! yields an empty sequence, and entries that disappear between listing and
//! stat are treated as never having existed.

use crate::entry::{EntryInfo, IgnoreExtensionSet};
use crate::error::{NoaError, Result};
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Glob-style pattern applied to entry names within one directory
///
/// `*` matches any run of characters and `?` matches exactly one. Everything
/// else is literal and case-sensitive. `*` and `*.*` match every name, so
/// extension-less files are not lost when a directory is walked with `*.*`.
#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    regex: Option<Regex>,
}

impl NamePattern {
    pub fn new(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(NoaError::InvalidPattern("empty name pattern".to_string()));
        }
        if pattern.contains(['/', '\\']) {
            return Err(NoaError::InvalidPattern(format!(
                "name pattern must not contain path separators: {}",
                pattern
            )));
        }
        if pattern == "*" || pattern == "*.*" {
            return Ok(Self::all());
        }

        let mut expr = String::with_capacity(pattern.len() * 2 + 2);
        expr.push('^');
        for ch in pattern.chars() {
            match ch {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                _ => expr.push_str(&regex::escape(ch.encode_utf8(&mut [0u8; 4]))),
            }
        }
        expr.push('$');

        Ok(Self {
            source: pattern.to_string(),
            regex: Some(Regex::new(&expr)?),
        })
    }

    /// Pattern matching every name (`*.*`)
    pub fn all() -> Self {
        Self {
            source: "*.*".to_string(),
            regex: None,
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(name),
            None => true,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// A command-line source argument split into directory and name pattern
///
/// `data/*.txt` lists `data` for `*.txt`; `data` (no separator) lists the
/// current directory for the literal name `data`; a trailing separator
/// (`data/`) selects every entry inside `data`.
#[derive(Debug, Clone)]
pub struct SourcePattern {
    pub directory: PathBuf,
    pub pattern: NamePattern,
}

impl SourcePattern {
    pub fn parse(source: &str) -> Result<Self> {
        if source.is_empty() {
            return Err(NoaError::InvalidPattern("empty source pattern".to_string()));
        }

        if source.ends_with(['/', '\\']) {
            return Ok(Self {
                directory: PathBuf::from(source),
                pattern: NamePattern::all(),
            });
        }

        let (directory, name) = match source.rfind(['/', '\\']) {
            Some(idx) => (&source[..=idx], &source[idx + 1..]),
            None => ("", source),
        };
        let directory = if directory.is_empty() {
            PathBuf::from(".")
        } else {
            PathBuf::from(directory)
        };

        Ok(Self {
            directory,
            pattern: NamePattern::new(name)?,
        })
    }
}

/// Lists directories into [`EntryInfo`] sequences
#[derive(Debug, Clone)]
pub struct TreeEnumerator {
    ignore: IgnoreExtensionSet,
    excluded: Option<PathBuf>,
}

impl TreeEnumerator {
    pub fn new(ignore: IgnoreExtensionSet) -> Self {
        Self {
            ignore,
            excluded: None,
        }
    }

    /// Never report `path` (typically the archive being written)
    pub fn with_excluded<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref();
        self.excluded = Some(fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()));
        self
    }

    /// Entries of `directory` whose names match `pattern`, sorted by name
    ///
    /// Symbolic links to files are packed as the file they point to. Links
    /// to directories are skipped so the walk always terminates.
    pub fn enumerate(&self, directory: &Path, pattern: &NamePattern) -> Vec<EntryInfo> {
        let listing = WalkDir::new(directory)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name();

        let mut entries = Vec::new();
        for dirent in listing {
            let dirent = match dirent {
                Ok(dirent) => dirent,
                Err(e) if e.depth() == 0 => {
                    warn!("Cannot list {}: {}", directory.display(), e);
                    return Vec::new();
                }
                Err(e) => {
                    debug!("Skipping unreadable entry in {}: {}", directory.display(), e);
                    continue;
                }
            };

            let os_name = dirent.file_name();
            let Some(name) = os_name.to_str() else {
                warn!(
                    "Skipping non UTF-8 name {:?} in {}",
                    os_name,
                    directory.display()
                );
                continue;
            };
            if !pattern.matches(name) {
                continue;
            }

            let path = dirent.path();
            let metadata = match fs::metadata(path) {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("{} vanished or dangles before stat", path.display());
                    continue;
                }
                Err(e) => {
                    debug!("Cannot stat {}: {}", path.display(), e);
                    continue;
                }
            };

            if metadata.is_dir() {
                if dirent.path_is_symlink() {
                    warn!("Skipping symlinked directory {}", path.display());
                    continue;
                }
                entries.push(EntryInfo::directory(name, SystemTime::now()));
            } else if metadata.is_file() {
                if self.is_excluded(path) {
                    debug!("Excluding {}", path.display());
                    continue;
                }
                let modified_at = metadata.modified().unwrap_or(UNIX_EPOCH);
                entries.push(EntryInfo::file(
                    name,
                    modified_at,
                    metadata.len(),
                    self.ignore.classify(name),
                ));
            } else {
                debug!("Skipping special file {}", path.display());
            }
        }

        entries
    }

    /// Top-level entries selected by a command-line source argument
    pub fn enumerate_source(&self, source: &SourcePattern) -> Vec<EntryInfo> {
        self.enumerate(&source.directory, &source.pattern)
    }

    fn is_excluded(&self, path: &Path) -> bool {
        match &self.excluded {
            Some(excluded) => fs::canonicalize(path)
                .map(|canonical| &canonical == excluded)
                .unwrap_or(false),
            None => false,
        }
    }
}

impl Default for TreeEnumerator {
    fn default() -> Self {
        Self::new(IgnoreExtensionSet::builtin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryKind, Encoding};
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, data: &[u8]) {
        fs::write(dir.join(name), data).unwrap();
    }

    #[test]
    fn test_name_pattern_wildcards() {
        let txt = NamePattern::new("*.txt").unwrap();
        assert!(txt.matches("a.txt"));
        assert!(txt.matches(".txt"));
        assert!(!txt.matches("a.txt.bak"));
        assert!(!txt.matches("a.TXT"));

        let single = NamePattern::new("file?.dat").unwrap();
        assert!(single.matches("file1.dat"));
        assert!(!single.matches("file10.dat"));

        let literal = NamePattern::new("a+b(1).txt").unwrap();
        assert!(literal.matches("a+b(1).txt"));
        assert!(!literal.matches("aab(1).txt"));
    }

    #[test]
    fn test_star_dot_star_matches_everything() {
        let all = NamePattern::new("*.*").unwrap();
        assert!(all.matches("Makefile"));
        assert!(all.matches("a.txt"));
        assert_eq!(all.as_str(), "*.*");
    }

    #[test]
    fn test_name_pattern_rejects_separators() {
        assert!(NamePattern::new("a/b").is_err());
        assert!(NamePattern::new("").is_err());
    }

    #[test]
    fn test_source_pattern_split() {
        let src = SourcePattern::parse("data/*.txt").unwrap();
        assert_eq!(src.directory, PathBuf::from("data/"));
        assert!(src.pattern.matches("x.txt"));

        let bare = SourcePattern::parse("data").unwrap();
        assert_eq!(bare.directory, PathBuf::from("."));
        assert!(bare.pattern.matches("data"));
        assert!(!bare.pattern.matches("other"));

        let inside = SourcePattern::parse("data/").unwrap();
        assert_eq!(inside.directory, PathBuf::from("data/"));
        assert!(inside.pattern.matches("anything"));
    }

    #[test]
    fn test_enumerate_classifies_and_sorts() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "story.dat", b"story");
        write(tmp.path(), "photo.PNG", b"png");
        write(tmp.path(), "README", b"readme");
        fs::create_dir(tmp.path().join("sub")).unwrap();

        let entries = TreeEnumerator::default().enumerate(tmp.path(), &NamePattern::all());
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["README", "photo.PNG", "story.dat", "sub"]);

        assert_eq!(
            entries[0].kind,
            EntryKind::File {
                size: 6,
                encoding: Encoding::Transformed
            }
        );
        assert_eq!(entries[1].encoding(), Some(Encoding::Raw));
        assert_eq!(entries[2].encoding(), Some(Encoding::Transformed));
        assert!(entries[3].is_dir());
    }

    #[test]
    fn test_enumerate_applies_pattern() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.txt", b"a");
        write(tmp.path(), "b.bin", b"b");

        let pattern = NamePattern::new("*.txt").unwrap();
        let entries = TreeEnumerator::default().enumerate(tmp.path(), &pattern);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "a.txt");
    }

    #[test]
    fn test_enumerate_missing_directory_is_empty() {
        let tmp = TempDir::new().unwrap();
        let entries =
            TreeEnumerator::default().enumerate(&tmp.path().join("missing"), &NamePattern::all());
        assert!(entries.is_empty());
    }

    #[test]
    fn test_enumerate_excludes_destination() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "keep.txt", b"keep");
        write(tmp.path(), "out.noa", b"");

        let enumerator = TreeEnumerator::default().with_excluded(tmp.path().join("out.noa"));
        let entries = enumerator.enumerate(tmp.path(), &NamePattern::all());
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["keep.txt"]);
    }

    #[test]
    fn test_enumerate_is_repeatable() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "one.txt", b"1");
        write(tmp.path(), "two.jpg", b"22");

        let enumerator = TreeEnumerator::default();
        let first = enumerator.enumerate(tmp.path(), &NamePattern::all());
        let second = enumerator.enumerate(tmp.path(), &NamePattern::all());
        assert_eq!(first, second);
    }

    #[cfg(unix)]
    #[test]
    fn test_enumerate_skips_symlinked_directories() {
        use std::os::unix::fs::symlink;

        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.txt", b"a");
        fs::create_dir(tmp.path().join("real")).unwrap();
        write(&tmp.path().join("real"), "b.txt", b"b");
        symlink(tmp.path(), tmp.path().join("loop")).unwrap();
        symlink(tmp.path().join("a.txt"), tmp.path().join("alias.txt")).unwrap();
        symlink(tmp.path().join("gone.txt"), tmp.path().join("dangling.txt")).unwrap();

        let entries = TreeEnumerator::default().enumerate(tmp.path(), &NamePattern::all());
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "alias.txt", "real"]);
        assert_eq!(entries[1].size(), 1);
    }
}
