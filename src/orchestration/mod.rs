//! Orchestration layer for the extraction pipeline
//!
//! This module provides the high-level components that drive a publish run:
//! per-context metadata extraction and the state-machine-driven publisher.

pub mod extractor;
pub mod publisher;

// Re-export main types for convenience
pub use extractor::{MetadataExtractor, discover_children};
pub use publisher::{ModulePublisher, PublishRequest, PublishSource};
