//! Artifact lookup inside a resolved container

use futures::future::try_join_all;
use pfind_core::{
    AmbiguityPolicy, ArtifactDescriptor, ChildQuery, ContainerId, EntryKind, Error, ObjectStore,
    Result,
};
use std::sync::Arc;

/// Finds a single named artifact inside a container.
#[derive(Clone)]
pub struct ArtifactLocator {
    store: Arc<dyn ObjectStore>,
    policy: AmbiguityPolicy,
}

impl ArtifactLocator {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            policy: AmbiguityPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: AmbiguityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Exact, case-sensitive lookup among non-deleted artifacts of `container`.
    ///
    /// `Ok(None)` means the artifact is absent (or ambiguous under
    /// [`AmbiguityPolicy::Reject`]).
    pub async fn find(
        &self,
        container: &ContainerId,
        name: &str,
    ) -> Result<Option<ArtifactDescriptor>> {
        let query = ChildQuery::children_of(container)
            .named(name)
            .of_kind(EntryKind::Artifact);

        let candidates = match self.store.list_children(&query).await {
            Ok(candidates) => candidates,
            Err(Error::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        if candidates.len() > 1 {
            tracing::warn!(
                container = %container,
                name,
                candidates = candidates.len(),
                policy = ?self.policy,
                "several artifacts share a name"
            );
        }

        Ok(self
            .policy
            .pick(candidates)
            .map(|entry| entry.into_descriptor(container)))
    }

    /// Look up several names in the same container concurrently.
    ///
    /// Results come back in the order of `names`.
    pub async fn find_each(
        &self,
        container: &ContainerId,
        names: &[&str],
    ) -> Result<Vec<Option<ArtifactDescriptor>>> {
        try_join_all(names.iter().map(|name| self.find(container, name))).await
    }
}
