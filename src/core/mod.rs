pub mod config;
pub mod error;
pub mod metadata;
pub mod state_machine;
pub mod traits;

pub use config::*;
pub use error::*;
pub use metadata::*;
pub use state_machine::*;
pub use traits::*;
