//! noa-pack: pack a directory tree into a single hierarchical archive
//!
//! The crate is split along the packing pipeline:
//! - [`enumerate`] lists one directory level into [`EntryInfo`] values and
//!   decides each file's [`Encoding`] from the fixed ignore-extension set
//! - [`packer`] walks the tree depth-first, driving an [`ArchiveSink`] and
//!   counting per-entry failures without stopping
//! - [`archive`] provides [`NoaWriter`], the concrete container writer
//!
//! # Example
//!
//! ```no_run
//! use noa_pack::{pack_to_path, NoProgress, PackConfig};
//!
//! let report = pack_to_path("assets.noa", "assets/*.*", &PackConfig::default(), &mut NoProgress)?;
//! println!("{} errors", report.error_count());
//! # Ok::<(), noa_pack::NoaError>(())
//! ```

pub mod archive;
pub mod config;
pub mod entry;
pub mod enumerate;
pub mod error;
pub mod packer;
pub mod progress;
pub mod sink;

use std::path::Path;

// Re-export commonly used types
pub use archive::{CompressionMethod, NoaWriter, WriterOptions};
pub use config::{Codec, PackConfig};
pub use entry::{EntryInfo, EntryKind, Encoding, IgnoreExtensionSet, IGNORE_COMPRESS_EXTENSIONS};
pub use enumerate::{NamePattern, SourcePattern, TreeEnumerator};
pub use error::{NoaError, Result};
pub use packer::{pack_tree, EntryFailure, FailureKind, PackReport, Packer, CHUNK_SIZE};
pub use progress::{ConsoleProgress, NoProgress, ProgressEvent, ProgressObserver};
pub use sink::{ArchiveSink, DirectoryScope, FileScope};

/// Pack the entries selected by `source` into a new archive at `destination`
pub fn pack_to_path<D, P>(
    destination: D,
    source: &str,
    config: &PackConfig,
    observer: &mut P,
) -> Result<PackReport>
where
    D: AsRef<Path>,
    P: ProgressObserver + ?Sized,
{
    let destination = destination.as_ref();
    config.validate()?;
    let source = SourcePattern::parse(source)?;

    let mut writer = NoaWriter::create(destination, config.writer_options())?;
    let enumerator = TreeEnumerator::new(IgnoreExtensionSet::builtin()).with_excluded(destination);

    pack_tree(&mut writer, &enumerator, &source, observer)
}
