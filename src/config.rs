//! Packing configuration
//!
//! Loaded from an optional TOML file and then overridden by command-line
//! flags:
//!
//! ```toml
//! [compression]
//! codec = "zstd"   # or "lz4"
//! level = 6
//!
//! [encryption]
//! password = "..."
//! ```
//!
//! The ignore-extension list is deliberately not configurable.

use crate::archive::{CompressionMethod, WriterOptions};
use crate::error::{NoaError, Result};
use serde::Deserialize;
use std::path::Path;

/// Codec used for `Transformed` entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    #[default]
    Zstd,
    Lz4,
}

impl From<Codec> for CompressionMethod {
    fn from(codec: Codec) -> Self {
        match codec {
            Codec::Zstd => CompressionMethod::Zstd,
            Codec::Lz4 => CompressionMethod::Lz4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressionConfig {
    pub codec: Codec,
    pub level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            codec: Codec::Zstd,
            level: 6,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncryptionConfig {
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackConfig {
    pub compression: CompressionConfig,
    pub encryption: EncryptionConfig,
}

impl PackConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.compression.codec == Codec::Zstd && !(1..=22).contains(&self.compression.level) {
            return Err(NoaError::InvalidConfig(format!(
                "zstd level must be between 1 and 22, got {}",
                self.compression.level
            )));
        }
        if matches!(&self.encryption.password, Some(password) if password.is_empty()) {
            return Err(NoaError::InvalidConfig("password must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn writer_options(&self) -> WriterOptions {
        WriterOptions {
            codec: self.compression.codec.into(),
            level: self.compression.level,
            password: self.encryption.password.clone(),
        }
    }
}
