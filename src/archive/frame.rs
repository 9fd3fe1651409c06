use crate::archive::format::CompressionMethod;
use crate::error::{NoaError, Result};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use sha2::Sha256;
use std::io::Write;

/// Frame flag: the frame content is compressed with the entry's method
pub const FRAME_FLAG_COMPRESSED: u8 = 0b1;

/// Bytes of frame prefix: length (uint32) + flags (uint8)
pub const FRAME_PREFIX_SIZE: u64 = 5;

/// AES-GCM nonce size
pub const NONCE_SIZE: usize = 12;

/// PBKDF2 iteration count for password-derived keys
pub const KDF_ROUNDS: u32 = 100_000;

/// Derive a 256-bit archive key from a password
pub fn derive_key(password: &str, salt: &[u8; 16], rounds: u32) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, rounds, &mut key);
    key
}

/// Encodes streamed chunks as independent frames
///
/// Each call to [`FrameEncoder::encode`] emits one frame:
/// `[stored_len: uint32][flags: uint8][payload]`, where the payload is the
/// chunk, compressed when that makes it smaller, then sealed as
/// `[nonce 12 bytes][ciphertext||tag]` when a key is set.
pub struct FrameEncoder {
    level: i32,
    cipher: Option<Aes256Gcm>,
}

impl FrameEncoder {
    pub fn new(level: i32, key: Option<&[u8; 32]>) -> Self {
        Self {
            level,
            cipher: key.map(|key| Aes256Gcm::new(key.into())),
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    /// Write one frame and return the number of bytes it occupies
    pub fn encode<W: Write>(
        &self,
        data: &[u8],
        method: CompressionMethod,
        mut writer: W,
    ) -> Result<u64> {
        let (content, flags) = match self.compress(data, method)? {
            Some(compressed) if compressed.len() < data.len() => {
                (compressed, FRAME_FLAG_COMPRESSED)
            }
            _ => (data.to_vec(), 0),
        };

        let payload = match &self.cipher {
            Some(cipher) => Self::seal(cipher, &content)?,
            None => content,
        };

        let stored_len = u32::try_from(payload.len()).map_err(|_| {
            NoaError::CompressionFailed(format!("Frame too large: {} bytes", payload.len()))
        })?;

        writer.write_all(&stored_len.to_le_bytes())?;
        writer.write_all(&[flags])?;
        writer.write_all(&payload)?;

        Ok(FRAME_PREFIX_SIZE + payload.len() as u64)
    }

    fn compress(&self, data: &[u8], method: CompressionMethod) -> Result<Option<Vec<u8>>> {
        match method {
            CompressionMethod::None => Ok(None),
            CompressionMethod::Lz4 => Ok(Some(lz4_flex::compress_prepend_size(data))),
            CompressionMethod::Zstd => zstd::encode_all(data, self.level).map(Some).map_err(|e| {
                NoaError::CompressionFailed(format!("Zstd frame compression failed: {}", e))
            }),
        }
    }

    /// Returns: [nonce 12 bytes][ciphertext||tag]
    fn seal(cipher: &Aes256Gcm, data: &[u8]) -> Result<Vec<u8>> {
        let nonce_bytes: [u8; NONCE_SIZE] = rand::random();
        #[allow(deprecated)]
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext_with_tag = cipher
            .encrypt(nonce, data)
            .map_err(|_| NoaError::EncryptionFailed)?;

        let mut payload = Vec::with_capacity(NONCE_SIZE + ciphertext_with_tag.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&ciphertext_with_tag);
        Ok(payload)
    }
}
