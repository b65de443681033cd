use crate::outcome::{Download, LocateOutcome, ParticipantFiles, ParticipantRef, SaveReceipt};
use chrono::Utc;
use pfind_access::Authorizer;
use pfind_core::config::{LayoutConfig, VersioningConfig};
use pfind_core::{
    AmbiguityPolicy, ArtifactId, ContainerId, Error, ObjectStore, PathSpec, Result, RetryPolicy,
    content_kind_for,
};
use pfind_telemetry::{SaveSpanAttributes, record_saved_version, save_span, store_call_span};
use pfind_versioning::{
    ArtifactLocator, PathResolver, Resolution, SaveContext, VersionAllocator, VersionedWriter,
};
use std::sync::Arc;
use tracing::Instrument;

/// Finds participant result files and saves edited copies.
///
/// Reads that fail with [`Error::StoreUnavailable`] are retried under the
/// configured [`RetryPolicy`]. Saves are attempted once; collisions are
/// handled inside [`VersionedWriter`].
pub struct ParticipantFinder {
    store: Arc<dyn ObjectStore>,
    authorizer: Arc<Authorizer>,
    anchor: ContainerId,
    layout: LayoutConfig,
    resolver: PathResolver,
    locator: ArtifactLocator,
    writer: VersionedWriter,
    retry: RetryPolicy,
}

impl ParticipantFinder {
    pub fn builder() -> ParticipantFinderBuilder {
        ParticipantFinderBuilder::new()
    }

    pub fn anchor(&self) -> &ContainerId {
        &self.anchor
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    async fn authorize(&self, identity: &str) -> Result<()> {
        if self.authorizer.is_authorized(identity).await {
            Ok(())
        } else {
            tracing::warn!(identity, "identity not on the allow-list");
            Err(Error::Unauthorized(identity.trim().to_string()))
        }
    }

    /// Resolve `{accelerometer}/{participant}/output_{participant}/results`
    /// under the anchor and look up the editable and read-only files there.
    ///
    /// The three lookups run concurrently.
    pub async fn locate_participant_files(
        &self,
        identity: &str,
        accelerometer_type: &str,
        participant_id: &str,
    ) -> Result<LocateOutcome> {
        self.authorize(identity).await?;

        if !self
            .layout
            .accelerometer_types
            .iter()
            .any(|t| t == accelerometer_type)
        {
            return Err(Error::InvalidPath(format!(
                "unknown accelerometer type '{}', expected one of {:?}",
                accelerometer_type, self.layout.accelerometer_types
            )));
        }
        let participant_id = participant_id.trim();
        let path = PathSpec::participant_results(accelerometer_type, participant_id)?;

        let resolution = self
            .retry
            .run("resolve path", || {
                self.resolver
                    .resolve(&self.anchor, &path)
                    .instrument(store_call_span("resolve", &path.to_string()))
            })
            .await?;

        let container = match resolution {
            Resolution::Resolved(container) => container,
            Resolution::Missing { index, segment } => {
                tracing::info!(path = %path, segment = %segment, "participant folder not found");
                return Ok(LocateOutcome::FolderMissing { index, segment });
            }
            Resolution::Ambiguous {
                index,
                segment,
                candidates,
            } => {
                return Ok(LocateOutcome::FolderAmbiguous {
                    index,
                    segment,
                    candidates,
                });
            }
        };

        let [sleep_pdf, data_pdf] = &self.layout.read_only_files;
        let names = [
            self.layout.editable_file.as_str(),
            sleep_pdf.as_str(),
            data_pdf.as_str(),
        ];
        let mut found = self
            .retry
            .run("locate files", || {
                self.locator
                    .find_each(&container, &names)
                    .instrument(store_call_span("find", container.as_str()))
            })
            .await?
            .into_iter();

        let editable = found.next().flatten();
        let read_only = [found.next().flatten(), found.next().flatten()];

        tracing::debug!(
            container = %container,
            editable = editable.is_some(),
            read_only = read_only.iter().filter(|f| f.is_some()).count(),
            "participant files located"
        );

        Ok(LocateOutcome::Found(ParticipantFiles {
            container,
            editable,
            read_only,
        }))
    }

    /// Download an artifact's bytes, typically the editable file.
    pub async fn load_editable(&self, identity: &str, id: &ArtifactId) -> Result<Vec<u8>> {
        self.authorize(identity).await?;

        self.retry
            .run("download content", || {
                self.store
                    .get_content(id)
                    .instrument(store_call_span("get_content", id.as_str()))
            })
            .await
    }

    /// Like [`Self::load_editable`], paired with the artifact's recorded MIME
    /// type. Falls back to the type implied by the id when the store has none.
    pub async fn download(&self, identity: &str, id: &ArtifactId) -> Result<Download> {
        self.authorize(identity).await?;

        let recorded = self
            .retry
            .run("read content kind", || {
                self.store
                    .content_kind(id)
                    .instrument(store_call_span("content_kind", id.as_str()))
            })
            .await?;
        let content = self
            .retry
            .run("download content", || {
                self.store
                    .get_content(id)
                    .instrument(store_call_span("get_content", id.as_str()))
            })
            .await?;

        Ok(Download {
            content_kind: recorded.unwrap_or_else(|| content_kind_for(id.as_str()).to_string()),
            content,
        })
    }

    /// The version number a save of `base_filename` into `container` would
    /// try first. Nothing is written.
    pub async fn next_version(
        &self,
        identity: &str,
        container: &ContainerId,
        base_filename: &str,
    ) -> Result<u64> {
        self.authorize(identity).await?;

        let allocator = VersionAllocator::new(self.store.clone());
        self.retry
            .run("scan versions", || {
                allocator
                    .next_version(container, base_filename)
                    .instrument(store_call_span("list_children", container.as_str()))
            })
            .await
    }

    /// Write `ctx.payload` as the next `{stem}_v{n}{.ext}` beside the original.
    ///
    /// The save is logged with the user, time and, when given, participant.
    pub async fn save_edited_artifact(
        &self,
        identity: &str,
        ctx: &SaveContext,
        participant: Option<&ParticipantRef>,
    ) -> Result<SaveReceipt> {
        self.authorize(identity).await?;

        let saved_by = identity.trim().to_lowercase();
        let span = save_span(&SaveSpanAttributes {
            user: saved_by.clone(),
            container_id: ctx.container.to_string(),
            base_filename: ctx.base_filename.clone(),
            participant_id: participant.map(|p| p.participant_id.clone()),
            accelerometer_type: participant.map(|p| p.accelerometer_type.clone()),
        });

        let artifact = self
            .writer
            .write_versioned(ctx)
            .instrument(span.clone())
            .await?;
        record_saved_version(&span, &artifact.descriptor.name, artifact.version);

        let saved_at = Utc::now();
        tracing::info!(
            user = %saved_by,
            timestamp = %saved_at.to_rfc3339(),
            participant_id = participant.map(|p| p.participant_id.as_str()).unwrap_or("-"),
            accelerometer_type = participant.map(|p| p.accelerometer_type.as_str()).unwrap_or("-"),
            name = %artifact.descriptor.name,
            id = %artifact.descriptor.id,
            "saved edited artifact"
        );

        Ok(SaveReceipt {
            artifact,
            saved_by,
            saved_at,
        })
    }
}

pub struct ParticipantFinderBuilder {
    store: Option<Arc<dyn ObjectStore>>,
    authorizer: Option<Arc<Authorizer>>,
    anchor: Option<ContainerId>,
    layout: LayoutConfig,
    versioning: VersioningConfig,
    retry: RetryPolicy,
}

impl ParticipantFinderBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            authorizer: None,
            anchor: None,
            layout: LayoutConfig::default(),
            versioning: VersioningConfig::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn authorizer(mut self, authorizer: Arc<Authorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    pub fn anchor(mut self, anchor: ContainerId) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    pub fn versioning(mut self, versioning: VersioningConfig) -> Self {
        self.versioning = versioning;
        self
    }

    pub fn ambiguity(mut self, policy: AmbiguityPolicy) -> Self {
        self.versioning.ambiguity = policy;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn build(self) -> Result<ParticipantFinder> {
        let store = self
            .store
            .ok_or_else(|| Error::Other(anyhow::anyhow!("Object store is required")))?;
        let authorizer = self
            .authorizer
            .ok_or_else(|| Error::Other(anyhow::anyhow!("Authorizer is required")))?;
        let anchor = self
            .anchor
            .ok_or_else(|| Error::Other(anyhow::anyhow!("Anchor container is required")))?;

        let policy = self.versioning.ambiguity;
        Ok(ParticipantFinder {
            resolver: PathResolver::new(store.clone()).with_policy(policy),
            locator: ArtifactLocator::new(store.clone()).with_policy(policy),
            writer: VersionedWriter::new(store.clone())
                .with_max_attempts(self.versioning.max_attempts),
            store,
            authorizer,
            anchor,
            layout: self.layout,
            retry: self.retry,
        })
    }
}

impl Default for ParticipantFinderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
