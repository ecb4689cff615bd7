//! External analysis tool integrations
//!
//! One module per tool, plus the [`CliToolchain`] facade that implements
//! the `AnalysisToolchain` seam over all of them.

pub mod infracost;
pub mod terraform;
pub mod terraform_docs;
pub mod tfsec;
pub mod toolchain;

pub use toolchain::CliToolchain;
