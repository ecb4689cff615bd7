pub mod git;
pub mod templates;
pub mod upload;

pub use git::GitAcquirer;
pub use upload::UploadedArchive;
