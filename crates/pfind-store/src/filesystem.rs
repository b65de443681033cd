//! File system object store implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pfind_core::{
    ArtifactDescriptor, ArtifactId, ChildQuery, ContainerId, CreateArtifactRequest, EntryKind,
    Error, ObjectStore, Result, StoreEntry, content_kind_for,
};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const TEMP_PREFIX: &str = ".pfind-tmp-";

/// File system object store implementation.
///
/// Directories are containers and regular files are artifacts. Ids are
/// `/`-separated paths relative to `base_path`, with `/` naming the root.
/// Hidden entries (leading `.`) are never listed.
pub struct FileSystemObjectStore {
    base_path: PathBuf,
}

impl FileSystemObjectStore {
    /// Create a new file system store rooted at `base_path`
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn root(&self) -> ContainerId {
        ContainerId::new("/")
    }

    /// Map an id onto a path under `base_path`, refusing anything that escapes it
    fn resolve_id(&self, id: &str) -> Result<PathBuf> {
        let relative = Path::new(id.trim_start_matches('/'));
        let mut path = self.base_path.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                _ => return Err(Error::InvalidPath(format!("illegal store id '{}'", id))),
            }
        }
        Ok(path)
    }

    fn child_id(parent: &str, name: &str) -> String {
        format!("{}/{}", parent.trim_end_matches('/'), name)
    }

    fn check_name(name: &str) -> Result<()> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.starts_with(TEMP_PREFIX)
            || name.contains(['/', '\\'])
        {
            return Err(Error::InvalidName(format!(
                "'{}' is not a valid artifact name",
                name
            )));
        }
        Ok(())
    }

    fn not_found_or_io(err: std::io::Error, what: &str) -> Error {
        if err.kind() == ErrorKind::NotFound {
            Error::NotFound(what.to_string())
        } else {
            Error::IoError(err)
        }
    }

    async fn require_dir(&self, id: &ContainerId) -> Result<PathBuf> {
        let path = self.resolve_id(id.as_str())?;
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| Self::not_found_or_io(e, &format!("Container not found: {}", id)))?;
        if !metadata.is_dir() {
            return Err(Error::NotFound(format!("Container not found: {}", id)));
        }
        Ok(path)
    }

    fn view_link(path: &Path) -> Option<String> {
        std::path::absolute(path)
            .ok()
            .map(|p| format!("file://{}", p.display()))
    }
}

#[async_trait]
impl ObjectStore for FileSystemObjectStore {
    async fn list_children(&self, query: &ChildQuery) -> Result<Vec<StoreEntry>> {
        let dir = self.require_dir(&query.parent).await?;

        let mut children = Vec::new();
        let mut entries = fs::read_dir(&dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with(TEMP_PREFIX) {
                continue;
            }

            let metadata = entry.metadata().await?;
            let kind = if metadata.is_dir() {
                EntryKind::Container
            } else if metadata.is_file() {
                EntryKind::Artifact
            } else {
                continue;
            };

            let created_at = metadata
                .created()
                .or_else(|_| metadata.modified())
                .ok()
                .map(DateTime::<Utc>::from);

            let child = StoreEntry {
                id: Self::child_id(query.parent.as_str(), &name),
                content_kind: (kind == EntryKind::Artifact)
                    .then(|| content_kind_for(&name).to_string()),
                view_link: Self::view_link(&entry.path()),
                name,
                kind,
                deleted: false,
                created_at,
            };

            if query.matches(&child) {
                children.push(child);
            }
        }

        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }

    async fn get_content(&self, id: &ArtifactId) -> Result<Vec<u8>> {
        let path = self.resolve_id(id.as_str())?;
        let what = format!("Artifact not found: {}", id);

        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| Self::not_found_or_io(e, &what))?;
        if !metadata.is_file() {
            return Err(Error::NotFound(what));
        }

        fs::read(&path)
            .await
            .map_err(|e| Self::not_found_or_io(e, &what))
    }

    /// Derived from the file extension; the directory tree keeps no metadata.
    async fn content_kind(&self, id: &ArtifactId) -> Result<Option<String>> {
        let path = self.resolve_id(id.as_str())?;
        let what = format!("Artifact not found: {}", id);
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| Self::not_found_or_io(e, &what))?;
        if !metadata.is_file() {
            return Err(Error::NotFound(what));
        }
        Ok(Some(content_kind_for(id.as_str()).to_string()))
    }

    async fn create_artifact(&self, req: CreateArtifactRequest) -> Result<ArtifactDescriptor> {
        Self::check_name(&req.name)?;
        let dir = self.require_dir(&req.parent).await?;
        let target = dir.join(&req.name);

        // Stage under a hidden name, then hard-link into place. The link
        // fails if the target already exists.
        let staging = dir.join(format!("{}{}", TEMP_PREFIX, Uuid::new_v4()));
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&staging)
            .await?;
        let written = async {
            file.write_all(&req.content).await?;
            file.sync_all().await
        }
        .await;
        drop(file);

        let published = match written {
            Ok(()) => fs::hard_link(&staging, &target).await,
            Err(e) => Err(e),
        };
        if let Err(e) = fs::remove_file(&staging).await {
            tracing::warn!(path = %staging.display(), error = %e, "failed to remove staging file");
        }

        match published {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(Error::NameCollision {
                    parent: req.parent.to_string(),
                    name: req.name,
                });
            }
            Err(e) => return Err(Error::IoError(e)),
        }

        Ok(ArtifactDescriptor {
            id: ArtifactId::new(Self::child_id(req.parent.as_str(), &req.name)),
            view_link: Self::view_link(&target),
            name: req.name,
            parent: req.parent,
            content_kind: Some(req.content_kind),
        })
    }
}
