//! Object store trait definition

use crate::*;
use async_trait::async_trait;

/// Parameters of a `createArtifact` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateArtifactRequest {
    pub parent: ContainerId,
    pub name: String,
    pub content: Vec<u8>,
    pub content_kind: String,
}

/// The hierarchical object store that holds participant data.
///
/// Containers and artifacts are addressed by opaque ids. Implementations must
/// never replace an existing artifact: `create_artifact` fails with
/// [`Error::NameCollision`] when a non-deleted child with the same name
/// already exists under the parent. Transport and credential failures are
/// reported as [`Error::StoreUnavailable`].
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List the children of `query.parent` that satisfy the query.
    async fn list_children(&self, query: &ChildQuery) -> Result<Vec<StoreEntry>>;

    /// Download the bytes of an artifact.
    async fn get_content(&self, id: &ArtifactId) -> Result<Vec<u8>>;

    /// The MIME type recorded for an artifact, if the store keeps one.
    async fn content_kind(&self, id: &ArtifactId) -> Result<Option<String>>;

    /// Create a new artifact and return its descriptor.
    async fn create_artifact(&self, req: CreateArtifactRequest) -> Result<ArtifactDescriptor>;
}
