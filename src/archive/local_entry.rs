use crate::archive::format::{
    path_len_u16, read_path, read_u16, read_u32, read_u64, read_u8, CompressionMethod, NodeKind,
};
use crate::error::{NoaError, Result};
use std::io::{Read, Write};

/// LOCA signature for local file entry headers
pub const LOCAL_ENTRY_SIGNATURE: [u8; 4] = [0x4C, 0x4F, 0x43, 0x41]; // "LOCA"

/// DIRE signature for directory records
pub const DIRECTORY_RECORD_SIGNATURE: [u8; 4] = [0x44, 0x49, 0x52, 0x45]; // "DIRE"

/// Local File Entry Header
///
/// Precedes each file's payload. The writer emits it with zeroed sizes when
/// a file begins and rewrites it in place once the stream is complete; the
/// path does not change, so the header length is stable.
///
/// Structure (variable length):
/// - Signature: "LOCA" (4 bytes)
/// - Uncompressed Size: uint64 (8 bytes)
/// - Stored Size: uint64 (8 bytes)
/// - CRC32: uint32 (4 bytes)
/// - Frame Count: uint32 (4 bytes)
/// - Modified Timestamp: uint64 (8 bytes)
/// - Compression Method: uint8 (1 byte)
/// - Flags: uint8 (1 byte)
/// - Path Length: uint16 (2 bytes)
/// - Reserved: 4 bytes
/// - File Path: variable (null-terminated UTF-8)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntryHeader {
    pub uncompressed_size: u64,
    pub stored_size: u64,
    pub crc32: u32,
    pub frame_count: u32,
    pub modified_time: u64,
    pub compression: CompressionMethod,
    pub flags: u8,
    pub path: String,
}

impl LocalEntryHeader {
    /// Header for a file whose payload has not been written yet
    pub fn pending(
        path: String,
        modified_time: u64,
        compression: CompressionMethod,
        flags: u8,
    ) -> Self {
        Self {
            uncompressed_size: 0,
            stored_size: 0,
            crc32: 0,
            frame_count: 0,
            modified_time,
            compression,
            flags,
            path,
        }
    }

    /// Write local entry header to a writer
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<usize> {
        let path_bytes = self.path.as_bytes();
        let path_len = path_len_u16(&self.path)?;

        writer.write_all(&LOCAL_ENTRY_SIGNATURE)?;
        writer.write_all(&self.uncompressed_size.to_le_bytes())?;
        writer.write_all(&self.stored_size.to_le_bytes())?;
        writer.write_all(&self.crc32.to_le_bytes())?;
        writer.write_all(&self.frame_count.to_le_bytes())?;
        writer.write_all(&self.modified_time.to_le_bytes())?;
        writer.write_all(&[self.compression as u8, self.flags])?;
        writer.write_all(&path_len.to_le_bytes())?;

        // Reserved
        writer.write_all(&[0u8; 4])?;

        writer.write_all(path_bytes)?;
        writer.write_all(&[0u8])?;

        Ok(self.header_size())
    }

    /// Read local entry header from a reader
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut sig = [0u8; 4];
        reader.read_exact(&mut sig)?;
        if sig != LOCAL_ENTRY_SIGNATURE {
            return Err(NoaError::InvalidFormat(
                "Invalid local entry signature (expected LOCA)".to_string(),
            ));
        }

        let uncompressed_size = read_u64(&mut reader)?;
        let stored_size = read_u64(&mut reader)?;
        let crc32 = read_u32(&mut reader)?;
        let frame_count = read_u32(&mut reader)?;
        let modified_time = read_u64(&mut reader)?;
        let compression = CompressionMethod::from_u8(read_u8(&mut reader)?)?;
        let flags = read_u8(&mut reader)?;
        let path_len = read_u16(&mut reader)?;

        let mut reserved = [0u8; 4];
        reader.read_exact(&mut reserved)?;

        let mut path_buf = vec![0u8; path_len as usize];
        reader.read_exact(&mut path_buf)?;
        let path = String::from_utf8(path_buf)
            .map_err(|e| NoaError::PathError(format!("Invalid UTF-8 in path: {}", e)))?;

        if read_u8(&mut reader)? != 0 {
            return Err(NoaError::InvalidFormat(
                "Missing null terminator in local entry path".to_string(),
            ));
        }

        Ok(Self {
            uncompressed_size,
            stored_size,
            crc32,
            frame_count,
            modified_time,
            compression,
            flags,
            path,
        })
    }

    /// Calculate the total size of this header when written
    pub fn header_size(&self) -> usize {
        4 + // Signature
        8 + // Uncompressed size
        8 + // Stored size
        4 + // CRC32
        4 + // Frame count
        8 + // Modified timestamp
        1 + // Compression method
        1 + // Flags
        2 + // Path length
        4 + // Reserved
        self.path.len() + 1 // Path + null terminator
    }
}

/// One child announced by a directory record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryChild {
    pub name: String,
    pub kind: NodeKind,
    pub compression: CompressionMethod,
    pub size: u64,
    pub modified_time: u64,
}

/// Directory record
///
/// Written when a directory is created, before any of its contents, so the
/// container knows a directory's full listing up front.
///
/// Structure (variable length):
/// - Signature: "DIRE" (4 bytes)
/// - Modified Timestamp: uint64
/// - Child Count: uint32
/// - Path Length: uint16, Path: variable (empty for the archive root)
/// - Per child: Kind uint8, Compression uint8, Size uint64,
///   Modified Timestamp uint64, Name Length uint16, Name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRecord {
    pub path: String,
    pub modified_time: u64,
    pub children: Vec<DirectoryChild>,
}

impl DirectoryRecord {
    /// Lengths are validated before anything is written.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<usize> {
        let child_count = u32::try_from(self.children.len()).map_err(|_| {
            NoaError::InvalidFormat(format!("Too many children in {}", self.path))
        })?;
        let path_len = path_len_u16(&self.path)?;
        let name_lens = self
            .children
            .iter()
            .map(|child| path_len_u16(&child.name))
            .collect::<Result<Vec<_>>>()?;

        writer.write_all(&DIRECTORY_RECORD_SIGNATURE)?;
        writer.write_all(&self.modified_time.to_le_bytes())?;
        writer.write_all(&child_count.to_le_bytes())?;
        writer.write_all(&path_len.to_le_bytes())?;
        writer.write_all(self.path.as_bytes())?;
        let mut bytes_written = 18 + self.path.len();

        for (child, name_len) in self.children.iter().zip(name_lens) {
            writer.write_all(&[child.kind as u8, child.compression as u8])?;
            writer.write_all(&child.size.to_le_bytes())?;
            writer.write_all(&child.modified_time.to_le_bytes())?;
            writer.write_all(&name_len.to_le_bytes())?;
            writer.write_all(child.name.as_bytes())?;
            bytes_written += 20 + child.name.len();
        }

        Ok(bytes_written)
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut sig = [0u8; 4];
        reader.read_exact(&mut sig)?;
        if sig != DIRECTORY_RECORD_SIGNATURE {
            return Err(NoaError::InvalidFormat(
                "Invalid directory record signature (expected DIRE)".to_string(),
            ));
        }

        let modified_time = read_u64(&mut reader)?;
        let child_count = read_u32(&mut reader)?;
        let path = read_path(&mut reader)?;

        let mut children = Vec::new();
        for _ in 0..child_count {
            let kind = NodeKind::from_u8(read_u8(&mut reader)?)?;
            let compression = CompressionMethod::from_u8(read_u8(&mut reader)?)?;
            let size = read_u64(&mut reader)?;
            let modified_time = read_u64(&mut reader)?;
            let name = read_path(&mut reader)?;
            children.push(DirectoryChild {
                name,
                kind,
                compression,
                size,
                modified_time,
            });
        }

        Ok(Self {
            path,
            modified_time,
            children,
        })
    }
}
