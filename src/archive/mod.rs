mod end_record;
mod format;
mod frame;
mod local_entry;
mod writer;

pub use end_record::{EndRecord, END_RECORD_SIGNATURE, END_RECORD_SIZE};
pub use format::{
    unix_seconds, CentralEntry, CompressionMethod, FileHeader, NodeKind, CENTRAL_ENTRY_SIGNATURE,
    ENTRY_FLAG_FRAMED, FORMAT_VERSION_MAJOR, FORMAT_VERSION_MINOR, HEADER_FLAG_ENCRYPTED,
    HEADER_SIZE, MAGIC_NUMBER,
};
pub use frame::{derive_key, FrameEncoder, FRAME_FLAG_COMPRESSED, KDF_ROUNDS, NONCE_SIZE};
pub use local_entry::{
    DirectoryChild, DirectoryRecord, LocalEntryHeader, DIRECTORY_RECORD_SIGNATURE,
    LOCAL_ENTRY_SIGNATURE,
};
pub use writer::{NoaWriter, WriterOptions};
