//! Core traits and types for pfind
//!
//! This crate provides the shared vocabulary of the participant file finder:
//! identifiers, the object store abstraction, the error taxonomy and the
//! configuration model.

pub mod auth;
pub mod config;
pub mod error;
pub mod retry;
pub mod store;
pub mod types;

// Re-exports
pub use auth::{AuthProvider, GCloudConfig, TokenConfig};
pub use config::PfindConfig;
pub use error::{Error, Result};
pub use retry::RetryPolicy;
pub use store::{CreateArtifactRequest, ObjectStore};
#[cfg(feature = "mock")]
pub use store::MockObjectStore;
pub use types::{
    AmbiguityPolicy, ArtifactDescriptor, ArtifactId, ChildQuery, ContainerId, EntryKind,
    NameFilter, PathSpec, StoreEntry, VersionedName, content_kind_for, split_base_filename,
};
