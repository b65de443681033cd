//! Path resolution and monotonic versioning
//!
//! Walks a chain of named containers, locates artifacts inside the target
//! container and writes edited copies under fresh `{stem}_v{n}{.ext}` names.
//! Nothing in this crate modifies or deletes an existing artifact.

mod allocator;
mod locator;
mod resolver;
mod writer;

pub use allocator::VersionAllocator;
pub use locator::ArtifactLocator;
pub use resolver::{PathResolver, Resolution};
pub use writer::{SaveContext, VersionedArtifact, VersionedWriter, WriteState};
