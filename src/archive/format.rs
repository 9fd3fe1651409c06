use crate::entry::Encoding;
use crate::error::{NoaError, Result};
use std::io::{Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

/// Magic number: 0x89 'N' 'O' 'A' 0x0D 0x0A 0x1A 0x0A
/// Follows PNG pattern for corruption detection
pub const MAGIC_NUMBER: [u8; 8] = [0x89, b'N', b'O', b'A', 0x0D, 0x0A, 0x1A, 0x0A];

/// Current format version
pub const FORMAT_VERSION_MAJOR: u16 = 1;
pub const FORMAT_VERSION_MINOR: u16 = 0;

/// Header size in bytes
pub const HEADER_SIZE: usize = 64;

/// Header flag: file payloads are AES-256-GCM sealed per frame
pub const HEADER_FLAG_ENCRYPTED: u32 = 0b1;

/// Entry flag: payload is a sequence of length-prefixed frames
pub const ENTRY_FLAG_FRAMED: u8 = 0b1;

/// Central directory entry signature "CENT"
pub const CENTRAL_ENTRY_SIGNATURE: [u8; 4] = [0x43, 0x45, 0x4E, 0x54];

/// Compression methods supported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionMethod {
    None = 0,
    Lz4 = 1,
    Zstd = 2,
}

impl CompressionMethod {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Lz4),
            2 => Ok(Self::Zstd),
            _ => Err(NoaError::InvalidCompression(value)),
        }
    }

    /// Method used for an entry: raw entries are never compressed,
    /// transformed entries use the archive's codec
    pub fn for_encoding(encoding: Encoding, codec: CompressionMethod) -> Self {
        match encoding {
            Encoding::Raw => Self::None,
            Encoding::Transformed => codec,
        }
    }
}

/// Kind of node recorded in the central directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeKind {
    File = 0,
    Directory = 1,
}

impl NodeKind {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::File),
            1 => Ok(Self::Directory),
            _ => Err(NoaError::InvalidFormat(format!("Unknown node kind: {}", value))),
        }
    }
}

/// Seconds since the Unix epoch, clamped to zero for earlier times
pub fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// File header at the beginning of the archive
///
/// Structure (64 bytes fixed):
/// - Magic: 8 bytes
/// - Version Major / Minor: uint16 each
/// - Flags: uint32
/// - Central Directory Offset: uint64
/// - Central Directory Size: uint64
/// - Entry Count: uint32
/// - KDF Rounds: uint32 (0 when unencrypted)
/// - KDF Salt: 16 bytes
/// - Reserved: 8 bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub version_major: u16,
    pub version_minor: u16,
    pub flags: u32,
    pub central_directory_offset: u64,
    pub central_directory_size: u64,
    pub entry_count: u32,
    pub kdf_rounds: u32,
    pub kdf_salt: [u8; 16],
}

impl FileHeader {
    pub fn new() -> Self {
        Self {
            version_major: FORMAT_VERSION_MAJOR,
            version_minor: FORMAT_VERSION_MINOR,
            flags: 0,
            central_directory_offset: 0,
            central_directory_size: 0,
            entry_count: 0,
            kdf_rounds: 0,
            kdf_salt: [0u8; 16],
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & HEADER_FLAG_ENCRYPTED != 0
    }

    /// Write header to a writer
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&MAGIC_NUMBER)?;
        writer.write_all(&self.version_major.to_le_bytes())?;
        writer.write_all(&self.version_minor.to_le_bytes())?;
        writer.write_all(&self.flags.to_le_bytes())?;
        writer.write_all(&self.central_directory_offset.to_le_bytes())?;
        writer.write_all(&self.central_directory_size.to_le_bytes())?;
        writer.write_all(&self.entry_count.to_le_bytes())?;
        writer.write_all(&self.kdf_rounds.to_le_bytes())?;
        writer.write_all(&self.kdf_salt)?;

        // Reserved
        writer.write_all(&[0u8; 8])?;

        Ok(())
    }

    /// Read header from a reader
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;

        if magic != MAGIC_NUMBER {
            return Err(NoaError::InvalidMagic);
        }

        let version_major = read_u16(&mut reader)?;
        let version_minor = read_u16(&mut reader)?;
        let flags = read_u32(&mut reader)?;
        let central_directory_offset = read_u64(&mut reader)?;
        let central_directory_size = read_u64(&mut reader)?;
        let entry_count = read_u32(&mut reader)?;
        let kdf_rounds = read_u32(&mut reader)?;

        let mut kdf_salt = [0u8; 16];
        reader.read_exact(&mut kdf_salt)?;

        let mut reserved = [0u8; 8];
        reader.read_exact(&mut reserved)?;

        Ok(Self {
            version_major,
            version_minor,
            flags,
            central_directory_offset,
            central_directory_size,
            entry_count,
            kdf_rounds,
            kdf_salt,
        })
    }
}

impl Default for FileHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Central directory record, one per directory and file in the archive
///
/// Structure (variable length):
/// - Signature: "CENT" (4 bytes)
/// - Node Kind: uint8
/// - Compression Method: uint8
/// - Flags: uint8
/// - Reserved: 1 byte
/// - Record Offset: uint64 (LOCA or DIRE record)
/// - Uncompressed Size: uint64
/// - Stored Size: uint64
/// - CRC32: uint32
/// - Frame Count: uint32
/// - Modified Timestamp: uint64
/// - Path Length: uint16
/// - Path: variable (UTF-8, `/` separated)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralEntry {
    pub path: String,
    pub kind: NodeKind,
    pub record_offset: u64,
    pub uncompressed_size: u64,
    pub stored_size: u64,
    pub crc32: u32,
    pub frame_count: u32,
    pub modified_time: u64,
    pub compression: CompressionMethod,
    pub flags: u8,
}

impl CentralEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Write entry to central directory
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<usize> {
        let path_bytes = self.path.as_bytes();
        let path_len = path_len_u16(&self.path)?;

        writer.write_all(&CENTRAL_ENTRY_SIGNATURE)?;
        writer.write_all(&[self.kind as u8, self.compression as u8, self.flags, 0])?;
        writer.write_all(&self.record_offset.to_le_bytes())?;
        writer.write_all(&self.uncompressed_size.to_le_bytes())?;
        writer.write_all(&self.stored_size.to_le_bytes())?;
        writer.write_all(&self.crc32.to_le_bytes())?;
        writer.write_all(&self.frame_count.to_le_bytes())?;
        writer.write_all(&self.modified_time.to_le_bytes())?;
        writer.write_all(&path_len.to_le_bytes())?;
        writer.write_all(path_bytes)?;

        Ok(50 + path_bytes.len())
    }

    /// Read entry from central directory
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut sig = [0u8; 4];
        reader.read_exact(&mut sig)?;
        if sig != CENTRAL_ENTRY_SIGNATURE {
            return Err(NoaError::InvalidFormat(
                "Invalid central directory entry signature".to_string(),
            ));
        }

        let mut bytes = [0u8; 4];
        reader.read_exact(&mut bytes)?;
        let kind = NodeKind::from_u8(bytes[0])?;
        let compression = CompressionMethod::from_u8(bytes[1])?;
        let flags = bytes[2];

        let record_offset = read_u64(&mut reader)?;
        let uncompressed_size = read_u64(&mut reader)?;
        let stored_size = read_u64(&mut reader)?;
        let crc32 = read_u32(&mut reader)?;
        let frame_count = read_u32(&mut reader)?;
        let modified_time = read_u64(&mut reader)?;
        let path = read_path(&mut reader)?;

        Ok(Self {
            path,
            kind,
            record_offset,
            uncompressed_size,
            stored_size,
            crc32,
            frame_count,
            modified_time,
            compression,
            flags,
        })
    }
}

/// Length of a path as stored on disk
pub(crate) fn path_len_u16(path: &str) -> Result<u16> {
    u16::try_from(path.len()).map_err(|_| {
        NoaError::PathError(format!(
            "Path too long: {} bytes (max {})",
            path.len(),
            u16::MAX
        ))
    })
}

/// Read a uint16-length-prefixed UTF-8 path
pub(crate) fn read_path<R: Read>(mut reader: R) -> Result<String> {
    let path_len = read_u16(&mut reader)?;
    let mut path_buf = vec![0u8; path_len as usize];
    reader.read_exact(&mut path_buf)?;
    String::from_utf8(path_buf)
        .map_err(|e| NoaError::PathError(format!("Invalid UTF-8 in path: {}", e)))
}

// Helper functions for reading primitive types
pub(crate) fn read_u8<R: Read>(mut reader: R) -> Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub(crate) fn read_u16<R: Read>(mut reader: R) -> Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

pub(crate) fn read_u32<R: Read>(mut reader: R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_u64<R: Read>(mut reader: R) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}
