use crate::archive::end_record::EndRecord;
use crate::archive::format::{
    unix_seconds, CentralEntry, CompressionMethod, FileHeader, NodeKind, ENTRY_FLAG_FRAMED,
    HEADER_FLAG_ENCRYPTED,
};
use crate::archive::frame::{derive_key, FrameEncoder, KDF_ROUNDS};
use crate::archive::local_entry::{DirectoryChild, DirectoryRecord, LocalEntryHeader};
use crate::entry::{EntryInfo, EntryKind};
use crate::error::{NoaError, Result};
use crate::sink::ArchiveSink;
use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// Options for a new archive
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Codec applied to `Transformed` entries
    pub codec: CompressionMethod,
    /// Zstd compression level (ignored by LZ4)
    pub level: i32,
    /// Enables per-frame AES-256-GCM when set
    pub password: Option<String>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            codec: CompressionMethod::Zstd,
            level: 6,
            password: None,
        }
    }
}

/// A directory the cursor has entered
struct DirCursor {
    path: String,
    announced: HashMap<String, EntryInfo>,
    written: HashSet<String>,
}

impl DirCursor {
    fn new(path: String, entries: &[EntryInfo]) -> Self {
        Self {
            path,
            announced: entries
                .iter()
                .map(|entry| (entry.name.clone(), entry.clone()))
                .collect(),
            written: HashSet::new(),
        }
    }

    fn child_path(&self, name: &str) -> String {
        if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.path, name)
        }
    }
}

/// The file currently being streamed
struct OpenFile {
    header_offset: u64,
    header: LocalEntryHeader,
    hasher: crc32fast::Hasher,
}

/// Archive writer for creating .noa files
///
/// Implements [`ArchiveSink`]: a single cursor walks the archive tree, and
/// every record is written as soon as the cursor reaches it. The header and
/// each local file header are rewritten in place once their sizes are known.
pub struct NoaWriter {
    writer: Option<BufWriter<File>>,
    path: PathBuf,
    header: FileHeader,
    codec: CompressionMethod,
    frames: FrameEncoder,
    dirs: Vec<DirCursor>,
    open_file: Option<OpenFile>,
    entries: Vec<CentralEntry>,
}

impl NoaWriter {
    /// Create a new archive file, truncating any existing one
    pub fn create<P: AsRef<Path>>(path: P, options: WriterOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|source| NoaError::DestinationOpenFailed {
                path: path.to_path_buf(),
                source,
            })?;
        let mut writer = BufWriter::new(file);

        let mut header = FileHeader::new();
        let key = options.password.as_deref().map(|password| {
            header.flags |= HEADER_FLAG_ENCRYPTED;
            header.kdf_rounds = KDF_ROUNDS;
            header.kdf_salt = rand::random();
            derive_key(password, &header.kdf_salt, header.kdf_rounds)
        });

        // Placeholder, rewritten on close
        header.write_to(&mut writer)?;

        Ok(Self {
            writer: Some(writer),
            path: path.to_path_buf(),
            header,
            codec: options.codec,
            frames: FrameEncoder::new(options.level, key.as_ref()),
            dirs: Vec::new(),
            open_file: None,
            entries: Vec::new(),
        })
    }

    /// Number of central directory records written so far
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Archive path of the cursor's directory (empty at the root)
    pub fn current_dir(&self) -> Option<&str> {
        self.dirs.last().map(|dir| dir.path.as_str())
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| NoaError::InvalidState("archive is closed".to_string()))
    }

    /// Cursor directory, refusing while a file is open
    fn ready_dir(&mut self) -> Result<&mut DirCursor> {
        if self.writer.is_none() {
            return Err(NoaError::InvalidState("archive is closed".to_string()));
        }
        if let Some(open) = &self.open_file {
            return Err(NoaError::InvalidState(format!(
                "file {} is still open",
                open.header.path
            )));
        }
        self.dirs
            .last_mut()
            .ok_or_else(|| NoaError::InvalidState("archive not created".to_string()))
    }

    /// Check a child name and reserve it in the cursor directory
    fn claim_child(&mut self, name: &str) -> Result<String> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
            return Err(NoaError::InvalidName(name.to_string()));
        }
        let dir = self.ready_dir()?;
        let path = dir.child_path(name);
        if !dir.written.insert(name.to_string()) {
            return Err(NoaError::DuplicateEntry(path));
        }
        Ok(path)
    }

    fn write_directory_record(&mut self, path: &str, entries: &[EntryInfo]) -> Result<u64> {
        let codec = self.codec;
        let record = DirectoryRecord {
            path: path.to_string(),
            modified_time: unix_seconds(SystemTime::now()),
            children: entries
                .iter()
                .map(|entry| directory_child(entry, codec))
                .collect(),
        };

        let writer = self.writer()?;
        let offset = writer.stream_position()?;
        record.write_to(writer)?;
        Ok(offset)
    }
}

fn directory_child(entry: &EntryInfo, codec: CompressionMethod) -> DirectoryChild {
    let (kind, compression, size) = match entry.kind {
        EntryKind::Directory => (NodeKind::Directory, CompressionMethod::None, 0),
        EntryKind::File { size, encoding } => (
            NodeKind::File,
            CompressionMethod::for_encoding(encoding, codec),
            size,
        ),
    };
    DirectoryChild {
        name: entry.name.clone(),
        kind,
        compression,
        size,
        modified_time: unix_seconds(entry.modified_at),
    }
}

impl ArchiveSink for NoaWriter {
    fn create_archive(&mut self, entries: &[EntryInfo]) -> Result<()> {
        self.writer()?;
        if !self.dirs.is_empty() {
            return Err(NoaError::InvalidState("archive already created".to_string()));
        }

        self.write_directory_record("", entries)?;
        self.dirs.push(DirCursor::new(String::new(), entries));
        debug!("Created archive {} with {} root entries", self.path.display(), entries.len());
        Ok(())
    }

    fn create_directory(&mut self, name: &str, entries: &[EntryInfo]) -> Result<()> {
        let path = self.claim_child(name)?;
        let record_offset = self.write_directory_record(&path, entries)?;

        self.entries.push(CentralEntry {
            path: path.clone(),
            kind: NodeKind::Directory,
            record_offset,
            uncompressed_size: 0,
            stored_size: 0,
            crc32: 0,
            frame_count: 0,
            modified_time: unix_seconds(SystemTime::now()),
            compression: CompressionMethod::None,
            flags: 0,
        });
        debug!("Entered archive directory {}", path);
        self.dirs.push(DirCursor::new(path, entries));
        Ok(())
    }

    fn ascend_directory(&mut self) -> Result<()> {
        self.ready_dir()?;
        if self.dirs.len() < 2 {
            return Err(NoaError::InvalidState(
                "cannot ascend above the archive root".to_string(),
            ));
        }
        self.dirs.pop();
        Ok(())
    }

    fn descend_file(
        &mut self,
        name: &str,
        info: Option<&EntryInfo>,
        _streaming: bool,
    ) -> Result<()> {
        // Content always arrives through write(); a non-streaming caller
        // simply writes its whole buffer once.
        let dir = self.ready_dir()?;
        let info = match info.or_else(|| dir.announced.get(name)) {
            Some(info) => info.clone(),
            None => return Err(NoaError::UnknownEntry(dir.child_path(name))),
        };
        let EntryKind::File { encoding, .. } = info.kind else {
            return Err(NoaError::InvalidState(format!(
                "{} is a directory, not a file",
                name
            )));
        };

        let path = self.claim_child(name)?;
        let compression = CompressionMethod::for_encoding(encoding, self.codec);
        let flags = if compression != CompressionMethod::None || self.frames.is_encrypted() {
            ENTRY_FLAG_FRAMED
        } else {
            0
        };
        let header =
            LocalEntryHeader::pending(path, unix_seconds(info.modified_at), compression, flags);

        let writer = self.writer()?;
        let header_offset = writer.stream_position()?;
        header.write_to(writer)?;

        self.open_file = Some(OpenFile {
            header_offset,
            header,
            hasher: crc32fast::Hasher::new(),
        });
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| NoaError::InvalidState("archive is closed".to_string()))?;
        let open = self
            .open_file
            .as_mut()
            .ok_or_else(|| NoaError::InvalidState("no file is open".to_string()))?;
        if buf.is_empty() {
            return Ok(0);
        }

        let stored = if open.header.flags & ENTRY_FLAG_FRAMED != 0 {
            let stored = self.frames.encode(buf, open.header.compression, &mut *writer)?;
            open.header.frame_count += 1;
            stored
        } else {
            writer.write_all(buf)?;
            buf.len() as u64
        };

        open.hasher.update(buf);
        open.header.uncompressed_size += buf.len() as u64;
        open.header.stored_size += stored;
        Ok(buf.len())
    }

    fn ascend_file(&mut self) -> Result<()> {
        let mut open = self
            .open_file
            .take()
            .ok_or_else(|| NoaError::InvalidState("no file is open".to_string()))?;
        open.header.crc32 = open.hasher.finalize();

        let writer = self.writer()?;
        let end = writer.stream_position()?;
        writer.seek(SeekFrom::Start(open.header_offset))?;
        open.header.write_to(&mut *writer)?;
        writer.seek(SeekFrom::Start(end))?;

        let header = open.header;
        debug!(
            "Wrote {} ({} -> {} bytes)",
            header.path, header.uncompressed_size, header.stored_size
        );
        self.entries.push(CentralEntry {
            path: header.path,
            kind: NodeKind::File,
            record_offset: open.header_offset,
            uncompressed_size: header.uncompressed_size,
            stored_size: header.stored_size,
            crc32: header.crc32,
            frame_count: header.frame_count,
            modified_time: header.modified_time,
            compression: header.compression,
            flags: header.flags,
        });
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.writer.is_none() {
            return Err(NoaError::InvalidState("archive is already closed".to_string()));
        }
        if let Some(open) = &self.open_file {
            return Err(NoaError::InvalidState(format!(
                "file {} is still open",
                open.header.path
            )));
        }
        if self.dirs.len() > 1 {
            return Err(NoaError::InvalidState(format!(
                "directory {} is still open",
                self.current_dir().unwrap_or_default()
            )));
        }

        let mut writer = self
            .writer
            .take()
            .ok_or_else(|| NoaError::InvalidState("archive is already closed".to_string()))?;

        // Central directory
        let mut central_directory = Vec::new();
        for entry in &self.entries {
            entry.write_to(&mut central_directory)?;
        }
        self.header.central_directory_offset = writer.stream_position()?;
        self.header.central_directory_size = central_directory.len() as u64;
        let count = self.entry_count();
        self.header.entry_count = u32::try_from(count)
            .map_err(|_| NoaError::InvalidFormat(format!("Too many entries: {}", count)))?;
        writer.write_all(&central_directory)?;

        EndRecord::for_header(&self.header, crc32fast::hash(&central_directory))
            .write_to(&mut writer)?;

        // Final header
        writer.seek(SeekFrom::Start(0))?;
        self.header.write_to(&mut writer)?;
        writer.flush()?;

        debug!(
            "Closed archive {} ({} entries)",
            self.path.display(),
            self.header.entry_count
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::end_record::{EndRecord, END_RECORD_SIZE};
    use crate::archive::format::HEADER_SIZE;
    use crate::archive::frame::tests::decode_frames;
    use crate::archive::local_entry::LOCAL_ENTRY_SIGNATURE;
    use crate::entry::Encoding;
    use std::time::UNIX_EPOCH;
    use tempfile::TempDir;

    fn file(name: &str, size: u64, encoding: Encoding) -> EntryInfo {
        EntryInfo::file(name, UNIX_EPOCH, size, encoding)
    }

    fn read_back(path: &Path) -> (Vec<u8>, FileHeader, Vec<CentralEntry>) {
        let bytes = std::fs::read(path).unwrap();
        let header = FileHeader::read_from(&bytes[..HEADER_SIZE]).unwrap();

        let end = EndRecord::read_from(&bytes[bytes.len() - END_RECORD_SIZE..]).unwrap();
        end.validate_against_header(&header).unwrap();

        let start = header.central_directory_offset as usize;
        let stop = start + header.central_directory_size as usize;
        let mut cursor = &bytes[start..stop];
        let mut entries = Vec::new();
        while !cursor.is_empty() {
            entries.push(CentralEntry::read_from(&mut cursor).unwrap());
        }
        assert_eq!(entries.len(), header.entry_count as usize);
        (bytes, header, entries)
    }

    fn payload<'a>(bytes: &'a [u8], entry: &CentralEntry) -> &'a [u8] {
        let offset = entry.record_offset as usize;
        let header = LocalEntryHeader::read_from(&bytes[offset..]).unwrap();
        let start = offset + header.header_size();
        &bytes[start..start + entry.stored_size as usize]
    }

    #[test]
    fn test_streams_raw_and_transformed_files() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.noa");
        let text = b"hello hello hello hello hello hello hello hello".repeat(50);
        let image = b"\x89PNG not really".to_vec();

        let root = vec![
            file("a.txt", text.len() as u64, Encoding::Transformed),
            EntryInfo::directory("sub", UNIX_EPOCH),
        ];
        let sub = vec![file("b.png", image.len() as u64, Encoding::Raw)];

        let mut writer = NoaWriter::create(&path, WriterOptions::default()).unwrap();
        writer.create_archive(&root).unwrap();
        writer.descend_file("a.txt", None, true).unwrap();
        for chunk in text.chunks(1000) {
            assert_eq!(writer.write(chunk).unwrap(), chunk.len());
        }
        writer.ascend_file().unwrap();
        writer.create_directory("sub", &sub).unwrap();
        assert_eq!(writer.current_dir(), Some("sub"));
        writer.descend_file("b.png", Some(&sub[0]), true).unwrap();
        writer.write(&image).unwrap();
        writer.ascend_file().unwrap();
        writer.ascend_directory().unwrap();
        writer.close().unwrap();

        let (bytes, header, entries) = read_back(&path);
        assert!(!header.is_encrypted());
        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "sub", "sub/b.png"]);

        let a = &entries[0];
        assert_eq!(a.compression, CompressionMethod::Zstd);
        assert_eq!(a.flags, ENTRY_FLAG_FRAMED);
        assert_eq!(a.uncompressed_size, text.len() as u64);
        assert_eq!(a.crc32, crc32fast::hash(&text));
        assert_eq!(a.frame_count, 3);
        assert_eq!(
            decode_frames(payload(&bytes, a), a.frame_count, a.compression, None),
            text
        );

        assert!(entries[1].is_dir());

        let b = &entries[2];
        assert_eq!(b.compression, CompressionMethod::None);
        assert_eq!(b.flags, 0);
        assert_eq!(payload(&bytes, b), &image[..]);
        assert_eq!(&bytes[b.record_offset as usize..][..4], &LOCAL_ENTRY_SIGNATURE);
    }

    #[test]
    fn test_directory_record_announces_children() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.noa");
        let sub = vec![
            file("b.png", 3, Encoding::Raw),
            file("c.dat", 9, Encoding::Transformed),
        ];

        let mut writer = NoaWriter::create(&path, WriterOptions::default()).unwrap();
        writer
            .create_archive(&[EntryInfo::directory("sub", UNIX_EPOCH)])
            .unwrap();
        writer.create_directory("sub", &sub).unwrap();
        writer.ascend_directory().unwrap();
        writer.close().unwrap();

        let (bytes, _, entries) = read_back(&path);
        let record = DirectoryRecord::read_from(&bytes[entries[0].record_offset as usize..]).unwrap();
        assert_eq!(record.path, "sub");
        let names: Vec<_> = record.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["b.png", "c.dat"]);
        assert_eq!(record.children[0].compression, CompressionMethod::None);
        assert_eq!(record.children[1].compression, CompressionMethod::Zstd);
        assert_eq!(record.children[1].size, 9);

        let root = DirectoryRecord::read_from(&bytes[HEADER_SIZE..]).unwrap();
        assert_eq!(root.path, "");
        assert_eq!(root.children[0].kind, NodeKind::Directory);
    }

    #[test]
    fn test_encrypted_archive() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("secret.noa");
        let options = WriterOptions {
            codec: CompressionMethod::Lz4,
            level: 0,
            password: Some("hunter2".to_string()),
        };
        let data = b"raw bytes that are stored but still sealed".to_vec();

        let mut writer = NoaWriter::create(&path, options).unwrap();
        writer
            .create_archive(&[file("clip.mp4", data.len() as u64, Encoding::Raw)])
            .unwrap();
        writer.descend_file("clip.mp4", None, true).unwrap();
        writer.write(&data).unwrap();
        writer.ascend_file().unwrap();
        writer.close().unwrap();

        let (bytes, header, entries) = read_back(&path);
        assert!(header.is_encrypted());
        assert_eq!(header.kdf_rounds, KDF_ROUNDS);

        let clip = &entries[0];
        assert_eq!(clip.compression, CompressionMethod::None);
        assert_eq!(clip.flags, ENTRY_FLAG_FRAMED);
        let key = derive_key("hunter2", &header.kdf_salt, header.kdf_rounds);
        assert_eq!(
            decode_frames(payload(&bytes, clip), clip.frame_count, clip.compression, Some(&key)),
            data
        );
    }

    #[test]
    fn test_refusals() {
        let tmp = TempDir::new().unwrap();
        let mut writer =
            NoaWriter::create(tmp.path().join("out.noa"), WriterOptions::default()).unwrap();

        // Nothing works before the root exists
        assert!(writer.descend_file("a.txt", None, true).is_err());

        writer
            .create_archive(&[file("a.txt", 1, Encoding::Transformed)])
            .unwrap();
        assert!(writer.create_archive(&[]).is_err());
        assert!(matches!(
            writer.descend_file("missing.txt", None, true),
            Err(NoaError::UnknownEntry(_))
        ));
        assert!(matches!(
            writer.create_directory("a/b", &[]),
            Err(NoaError::InvalidName(_))
        ));
        assert!(writer.ascend_directory().is_err());
        assert!(writer.write(b"x").is_err());

        writer.descend_file("a.txt", None, true).unwrap();
        assert!(writer.create_directory("sub", &[]).is_err());
        assert!(writer.close().is_err());
        writer.ascend_file().unwrap();
        assert!(matches!(
            writer.descend_file("a.txt", None, true),
            Err(NoaError::DuplicateEntry(_))
        ));

        writer.close().unwrap();
        assert!(writer.close().is_err());
        assert_eq!(writer.entry_count(), 1);
    }

    #[test]
    fn test_unwritable_destination() {
        let tmp = TempDir::new().unwrap();
        let result = NoaWriter::create(
            tmp.path().join("missing").join("out.noa"),
            WriterOptions::default(),
        );
        assert!(matches!(
            result,
            Err(NoaError::DestinationOpenFailed { .. })
        ));
    }
}
