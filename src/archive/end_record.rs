use crate::archive::format::{read_u16, read_u32, read_u64, FileHeader};
use crate::error::{NoaError, Result};
use std::io::{Read, Write};

/// ENDR signature for End of Central Directory Record
pub const END_RECORD_SIGNATURE: [u8; 4] = [0x45, 0x4E, 0x44, 0x52]; // "ENDR"

/// End Record size in bytes (fixed)
pub const END_RECORD_SIZE: usize = 64;

/// End of Central Directory Record (ENDR)
///
/// Located at the very end of the archive (last 64 bytes). Lets a consumer
/// confirm the archive was closed and locate the central directory from the
/// end of the file.
///
/// Structure (64 bytes fixed):
/// - Signature: "ENDR" (4 bytes)
/// - Version Major: uint16 (2 bytes)
/// - Version Minor: uint16 (2 bytes)
/// - Central Directory Offset: uint64 (8 bytes)
/// - Central Directory Size: uint64 (8 bytes)
/// - Entry Count: uint32 (4 bytes)
/// - Central Directory CRC32: uint32 (4 bytes)
/// - Reserved: 32 bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndRecord {
    pub version_major: u16,
    pub version_minor: u16,
    pub central_directory_offset: u64,
    pub central_directory_size: u64,
    pub entry_count: u32,
    pub central_directory_crc32: u32,
}

impl EndRecord {
    /// End record mirroring a finished header
    pub fn for_header(header: &FileHeader, central_directory_crc32: u32) -> Self {
        Self {
            version_major: header.version_major,
            version_minor: header.version_minor,
            central_directory_offset: header.central_directory_offset,
            central_directory_size: header.central_directory_size,
            entry_count: header.entry_count,
            central_directory_crc32,
        }
    }

    /// Write end record to a writer
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<usize> {
        writer.write_all(&END_RECORD_SIGNATURE)?;
        writer.write_all(&self.version_major.to_le_bytes())?;
        writer.write_all(&self.version_minor.to_le_bytes())?;
        writer.write_all(&self.central_directory_offset.to_le_bytes())?;
        writer.write_all(&self.central_directory_size.to_le_bytes())?;
        writer.write_all(&self.entry_count.to_le_bytes())?;
        writer.write_all(&self.central_directory_crc32.to_le_bytes())?;

        // Reserved
        writer.write_all(&[0u8; 32])?;

        Ok(END_RECORD_SIZE)
    }

    /// Read end record from a reader
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut sig = [0u8; 4];
        reader.read_exact(&mut sig)?;
        if sig != END_RECORD_SIGNATURE {
            return Err(NoaError::InvalidFormat(
                "Invalid end record signature (expected ENDR)".to_string(),
            ));
        }

        let version_major = read_u16(&mut reader)?;
        let version_minor = read_u16(&mut reader)?;
        let central_directory_offset = read_u64(&mut reader)?;
        let central_directory_size = read_u64(&mut reader)?;
        let entry_count = read_u32(&mut reader)?;
        let central_directory_crc32 = read_u32(&mut reader)?;

        let mut reserved = [0u8; 32];
        reader.read_exact(&mut reserved)?;

        Ok(Self {
            version_major,
            version_minor,
            central_directory_offset,
            central_directory_size,
            entry_count,
            central_directory_crc32,
        })
    }

    /// Validate end record matches header
    pub fn validate_against_header(&self, header: &FileHeader) -> Result<()> {
        if self.version_major != header.version_major
            || self.version_minor != header.version_minor
        {
            return Err(NoaError::InvalidFormat(format!(
                "ENDR version mismatch: header v{}.{}, ENDR v{}.{}",
                header.version_major, header.version_minor, self.version_major, self.version_minor
            )));
        }

        if self.central_directory_offset != header.central_directory_offset
            || self.central_directory_size != header.central_directory_size
        {
            return Err(NoaError::InvalidFormat(format!(
                "ENDR central directory mismatch: header {}+{}, ENDR {}+{}",
                header.central_directory_offset,
                header.central_directory_size,
                self.central_directory_offset,
                self.central_directory_size
            )));
        }

        if self.entry_count != header.entry_count {
            return Err(NoaError::InvalidFormat(format!(
                "ENDR entry count mismatch: header {}, ENDR {}",
                header.entry_count, self.entry_count
            )));
        }

        Ok(())
    }
}
