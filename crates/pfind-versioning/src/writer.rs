//! Versioned creation with collision retry

use crate::VersionAllocator;
use pfind_core::{
    ArtifactDescriptor, ContainerId, CreateArtifactRequest, Error, ObjectStore, Result,
    VersionedName, content_kind_for,
};
use std::sync::Arc;

/// Everything a save needs, passed explicitly per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveContext {
    pub container: ContainerId,
    pub base_filename: String,
    pub payload: Vec<u8>,
    /// Declared MIME type; derived from the base filename when absent
    pub content_kind: Option<String>,
}

impl SaveContext {
    pub fn new(
        container: ContainerId,
        base_filename: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            container,
            base_filename: base_filename.into(),
            payload: payload.into(),
            content_kind: None,
        }
    }

    pub fn with_content_kind(mut self, content_kind: impl Into<String>) -> Self {
        self.content_kind = Some(content_kind.into());
        self
    }

    fn content_kind(&self) -> String {
        self.content_kind
            .clone()
            .unwrap_or_else(|| content_kind_for(&self.base_filename).to_string())
    }
}

/// A successfully written version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedArtifact {
    pub descriptor: ArtifactDescriptor,
    pub version: u64,
    /// Create calls it took, including the successful one
    pub attempts: u32,
}

/// Per-save state machine.
///
/// `Idle -> Allocating -> Creating -> {Success | CollisionRetry -> Creating | Exhausted}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteState {
    Idle,
    Allocating,
    Creating { name: VersionedName, attempt: u32 },
    CollisionRetry { name: VersionedName, attempt: u32 },
    Success(VersionedArtifact),
    Exhausted { last_name: String, attempts: u32 },
}

/// Writes edited payloads as new `{stem}_v{n}{.ext}` artifacts next to the original.
///
/// The base-named artifact is never opened for writing. Version numbers are
/// allocated optimistically: a rescan picks a candidate, and when the store
/// reports a name collision the number is incremented and creation retried
/// without rescanning, up to `max_attempts` creates in total.
#[derive(Clone)]
pub struct VersionedWriter {
    store: Arc<dyn ObjectStore>,
    allocator: VersionAllocator,
    max_attempts: u32,
}

impl VersionedWriter {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            allocator: VersionAllocator::new(store.clone()),
            store,
            max_attempts: 5,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub async fn write_versioned(&self, ctx: &SaveContext) -> Result<VersionedArtifact> {
        let mut state = WriteState::Idle;

        loop {
            state = match self.step(ctx, state).await? {
                WriteState::Success(artifact) => {
                    tracing::info!(
                        container = %ctx.container,
                        name = %artifact.descriptor.name,
                        version = artifact.version,
                        attempts = artifact.attempts,
                        "versioned artifact created"
                    );
                    return Ok(artifact);
                }
                WriteState::Exhausted {
                    last_name,
                    attempts,
                } => {
                    tracing::warn!(
                        container = %ctx.container,
                        base_filename = %ctx.base_filename,
                        attempts,
                        "gave up allocating a version"
                    );
                    return Err(Error::VersionConflict {
                        base_filename: ctx.base_filename.clone(),
                        attempts,
                        last_name,
                    });
                }
                pending => pending,
            };
        }
    }

    async fn step(&self, ctx: &SaveContext, state: WriteState) -> Result<WriteState> {
        let next = match state {
            WriteState::Idle => WriteState::Allocating,
            WriteState::Allocating => {
                let version = self
                    .allocator
                    .next_version(&ctx.container, &ctx.base_filename)
                    .await?;
                WriteState::Creating {
                    name: VersionedName::new(&ctx.base_filename, version)?,
                    attempt: 1,
                }
            }
            WriteState::Creating { name, attempt } => {
                let request = CreateArtifactRequest {
                    parent: ctx.container.clone(),
                    name: name.to_string(),
                    content: ctx.payload.clone(),
                    content_kind: ctx.content_kind(),
                };
                match self.store.create_artifact(request).await {
                    Ok(descriptor) => WriteState::Success(VersionedArtifact {
                        descriptor,
                        version: name.version(),
                        attempts: attempt,
                    }),
                    Err(e) if e.is_collision() => {
                        tracing::debug!(name = %name, attempt, "version name taken");
                        if attempt >= self.max_attempts {
                            WriteState::Exhausted {
                                last_name: name.to_string(),
                                attempts: attempt,
                            }
                        } else {
                            WriteState::CollisionRetry { name, attempt }
                        }
                    }
                    Err(e) => return Err(e),
                }
            }
            WriteState::CollisionRetry { name, attempt } => match name.next() {
                Some(name) => WriteState::Creating {
                    name,
                    attempt: attempt + 1,
                },
                None => WriteState::Exhausted {
                    last_name: name.to_string(),
                    attempts: attempt,
                },
            },
            done @ (WriteState::Success(_) | WriteState::Exhausted { .. }) => done,
        };
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pfind_core::{ArtifactId, ChildQuery, MockObjectStore, StoreEntry};
    use pfind_store::InMemoryObjectStore;

    const BASE: &str = "data.csv";

    fn seeded() -> (InMemoryObjectStore, ContainerId, ArtifactId) {
        let store = InMemoryObjectStore::new();
        let root = store.root();
        let original = store.add_artifact(&root, BASE, "id,value\n1,a\n").unwrap();
        (store, root, original)
    }

    #[tokio::test]
    async fn test_first_save_is_v1_and_original_untouched() {
        let (store, root, original) = seeded();
        let writer = VersionedWriter::new(Arc::new(store.clone()));

        let saved = writer
            .write_versioned(&SaveContext::new(root.clone(), BASE, "id,value\n1,b\n"))
            .await
            .unwrap();

        assert_eq!(saved.version, 1);
        assert_eq!(saved.attempts, 1);
        assert_eq!(saved.descriptor.name, "data_v1.csv");
        assert_eq!(saved.descriptor.content_kind.as_deref(), Some("text/csv"));
        assert_ne!(saved.descriptor.id, original);

        assert_eq!(
            store.get_content(&original).await.unwrap(),
            b"id,value\n1,a\n"
        );
        assert_eq!(
            store.get_content(&saved.descriptor.id).await.unwrap(),
            b"id,value\n1,b\n"
        );
        assert_eq!(
            store.artifact_names(&root).unwrap(),
            vec!["data.csv", "data_v1.csv"]
        );
    }

    #[tokio::test]
    async fn test_sequential_saves_increase() {
        let (store, root, _) = seeded();
        let writer = VersionedWriter::new(Arc::new(store));

        let mut versions = Vec::new();
        for edit in ["a", "b", "c"] {
            let saved = writer
                .write_versioned(&SaveContext::new(root.clone(), BASE, edit))
                .await
                .unwrap();
            versions.push(saved.version);
        }
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_declared_content_kind_wins() {
        let (store, root, _) = seeded();
        let writer = VersionedWriter::new(Arc::new(store));

        let saved = writer
            .write_versioned(
                &SaveContext::new(root, BASE, "x").with_content_kind("text/plain; charset=utf-8"),
            )
            .await
            .unwrap();
        assert_eq!(
            saved.descriptor.content_kind.as_deref(),
            Some("text/plain; charset=utf-8")
        );
    }

    /// Hides every sibling from listings, as a stale index would.
    struct BlindListing(InMemoryObjectStore);

    #[async_trait]
    impl ObjectStore for BlindListing {
        async fn list_children(&self, _query: &ChildQuery) -> Result<Vec<StoreEntry>> {
            Ok(Vec::new())
        }

        async fn get_content(&self, id: &ArtifactId) -> Result<Vec<u8>> {
            self.0.get_content(id).await
        }

        async fn content_kind(&self, id: &ArtifactId) -> Result<Option<String>> {
            self.0.content_kind(id).await
        }

        async fn create_artifact(&self, req: CreateArtifactRequest) -> Result<ArtifactDescriptor> {
            self.0.create_artifact(req).await
        }
    }

    #[tokio::test]
    async fn test_collision_retries_without_rescan() {
        let (store, root, _) = seeded();
        store.add_artifact(&root, "data_v1.csv", "taken").unwrap();
        store.add_artifact(&root, "data_v2.csv", "taken").unwrap();

        let writer = VersionedWriter::new(Arc::new(BlindListing(store.clone())));
        let saved = writer
            .write_versioned(&SaveContext::new(root.clone(), BASE, "mine"))
            .await
            .unwrap();

        assert_eq!(saved.descriptor.name, "data_v3.csv");
        assert_eq!(saved.attempts, 3);
        assert_eq!(
            store.artifact_names(&root).unwrap(),
            vec!["data.csv", "data_v1.csv", "data_v2.csv", "data_v3.csv"]
        );
    }

    #[tokio::test]
    async fn test_exhausted_retries_is_version_conflict() {
        let (store, root, original) = seeded();
        for n in 1..=3 {
            store
                .add_artifact(&root, &format!("data_v{}.csv", n), "taken")
                .unwrap();
        }

        let writer =
            VersionedWriter::new(Arc::new(BlindListing(store.clone()))).with_max_attempts(3);
        let err = writer
            .write_versioned(&SaveContext::new(root.clone(), BASE, "mine"))
            .await
            .unwrap_err();

        match err {
            Error::VersionConflict {
                attempts,
                last_name,
                ..
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_name, "data_v3.csv");
            }
            other => panic!("Expected version conflict, got {other:?}"),
        }
        assert_eq!(store.get_content(&original).await.unwrap(), b"id,value\n1,a\n");
        assert_eq!(store.artifact_names(&root).unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_retried() {
        let mut store = MockObjectStore::new();
        store.expect_list_children().returning(|_| Ok(Vec::new()));
        store
            .expect_create_artifact()
            .times(1)
            .returning(|_| Err(Error::unavailable("502 bad gateway")));

        let writer = VersionedWriter::new(Arc::new(store));
        let err = writer
            .write_versioned(&SaveContext::new(ContainerId::new("c"), BASE, "x"))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_create_requests_carry_payload_unchanged() {
        let payload = vec![0u8, 159, 146, 150, b'\n'];
        let expected = payload.clone();

        let mut store = MockObjectStore::new();
        store.expect_list_children().returning(|_| Ok(Vec::new()));
        store
            .expect_create_artifact()
            .withf(move |req| req.name == "data_v1.csv" && req.content == expected)
            .times(1)
            .returning(|req| {
                Ok(ArtifactDescriptor {
                    id: ArtifactId::new("new-id"),
                    name: req.name,
                    parent: req.parent,
                    content_kind: Some(req.content_kind),
                    view_link: Some("https://drive.example/new-id".into()),
                })
            });

        let writer = VersionedWriter::new(Arc::new(store));
        let saved = writer
            .write_versioned(&SaveContext::new(ContainerId::new("c"), BASE, payload))
            .await
            .unwrap();
        assert_eq!(saved.descriptor.id.as_str(), "new-id");
        assert_eq!(
            saved.descriptor.view_link.as_deref(),
            Some("https://drive.example/new-id")
        );
    }
}
