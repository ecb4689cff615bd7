pub mod archive;
pub mod core;
pub mod orchestration;
pub mod security;
pub mod source;
pub mod store;
pub mod tools;
pub mod validation;

pub use archive::{ArchiveBuilder, LocalFileStorage, SafeUnpacker};
pub use core::*;
pub use orchestration::{ModulePublisher, PublishRequest, PublishSource};
pub use security::{CommandError, CostCredentials, SafeCommandExecutor};
pub use source::{GitAcquirer, UploadedArchive};
pub use store::MemoryCatalogStore;
pub use tools::CliToolchain;
