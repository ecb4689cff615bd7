//! Archive handling: safe unpacking, deterministic building, storage

pub mod builder;
pub mod storage;
pub mod unpack;

pub use builder::{ArchiveBuilder, BuiltArchive, compute_sha256};
pub use storage::LocalFileStorage;
pub use unpack::SafeUnpacker;
