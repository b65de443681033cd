//! In-memory object store implementation

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use pfind_core::{
    ArtifactDescriptor, ArtifactId, ChildQuery, ContainerId, CreateArtifactRequest, EntryKind,
    Error, ObjectStore, Result, StoreEntry, content_kind_for,
};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

const ROOT_ID: &str = "root";

#[derive(Debug, Clone)]
struct Node {
    entry: StoreEntry,
    parent: Option<ContainerId>,
    content: Vec<u8>,
}

#[derive(Debug)]
struct Tree {
    nodes: BTreeMap<String, Node>,
    last_created: DateTime<Utc>,
}

impl Tree {
    /// Creation timestamps are strictly increasing so insertion order is observable.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        self.last_created = if now > self.last_created {
            now
        } else {
            self.last_created + Duration::microseconds(1)
        };
        self.last_created
    }

    fn require_container(&self, id: &ContainerId) -> Result<()> {
        match self.nodes.get(id.as_str()) {
            Some(node) if node.entry.kind == EntryKind::Container && !node.entry.deleted => Ok(()),
            _ => Err(Error::NotFound(format!("Container not found: {}", id))),
        }
    }

    fn insert(
        &mut self,
        parent: &ContainerId,
        name: &str,
        kind: EntryKind,
        content: Vec<u8>,
        content_kind: Option<String>,
    ) -> Result<StoreEntry> {
        self.require_container(parent)?;

        let id = Uuid::new_v4().to_string();
        let entry = StoreEntry {
            id: id.clone(),
            name: name.to_string(),
            kind,
            content_kind,
            view_link: Some(format!("memory://{}", id)),
            deleted: false,
            created_at: Some(self.next_timestamp()),
        };

        self.nodes.insert(
            id,
            Node {
                entry: entry.clone(),
                parent: Some(parent.clone()),
                content,
            },
        );
        Ok(entry)
    }
}

/// In-memory object store implementation.
///
/// This is primarily for testing and demonstration purposes.
/// Seeding helpers may create same-named siblings; [`ObjectStore::create_artifact`]
/// never does.
#[derive(Clone)]
pub struct InMemoryObjectStore {
    tree: Arc<RwLock<Tree>>,
}

impl InMemoryObjectStore {
    /// Create a store holding only the root container
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            ROOT_ID.to_string(),
            Node {
                entry: StoreEntry {
                    id: ROOT_ID.to_string(),
                    name: String::new(),
                    kind: EntryKind::Container,
                    content_kind: None,
                    view_link: None,
                    deleted: false,
                    created_at: None,
                },
                parent: None,
                content: Vec::new(),
            },
        );

        Self {
            tree: Arc::new(RwLock::new(Tree {
                nodes,
                last_created: DateTime::<Utc>::MIN_UTC,
            })),
        }
    }

    pub fn root(&self) -> ContainerId {
        ContainerId::new(ROOT_ID)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tree>> {
        self.tree
            .read()
            .map_err(|_| Error::message("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tree>> {
        self.tree
            .write()
            .map_err(|_| Error::message("in-memory store lock poisoned"))
    }

    /// Seed a child container
    pub fn add_container(&self, parent: &ContainerId, name: &str) -> Result<ContainerId> {
        let entry = self
            .write()?
            .insert(parent, name, EntryKind::Container, Vec::new(), None)?;
        Ok(ContainerId::new(entry.id))
    }

    /// Seed a chain of nested containers and return the innermost one
    pub fn add_path(&self, parent: &ContainerId, names: &[&str]) -> Result<ContainerId> {
        let mut current = parent.clone();
        for name in names {
            current = self.add_container(&current, name)?;
        }
        Ok(current)
    }

    /// Seed an artifact, bypassing the collision check
    pub fn add_artifact(
        &self,
        parent: &ContainerId,
        name: &str,
        content: impl Into<Vec<u8>>,
    ) -> Result<ArtifactId> {
        let entry = self.write()?.insert(
            parent,
            name,
            EntryKind::Artifact,
            content.into(),
            Some(content_kind_for(name).to_string()),
        )?;
        Ok(ArtifactId::new(entry.id))
    }

    /// Flag an entry as deleted (trashed)
    pub fn mark_deleted(&self, id: &str) -> Result<()> {
        let mut tree = self.write()?;
        let node = tree
            .nodes
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("Entry not found: {}", id)))?;
        node.entry.deleted = true;
        Ok(())
    }

    /// Override an entry's creation timestamp
    pub fn set_created_at(&self, id: &str, created_at: Option<DateTime<Utc>>) -> Result<()> {
        let mut tree = self.write()?;
        let node = tree
            .nodes
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("Entry not found: {}", id)))?;
        node.entry.created_at = created_at;
        Ok(())
    }

    /// Names of every artifact directly under `parent`, deleted ones included, sorted
    pub fn artifact_names(&self, parent: &ContainerId) -> Result<Vec<String>> {
        let tree = self.read()?;
        let mut names: Vec<String> = tree
            .nodes
            .values()
            .filter(|n| n.parent.as_ref() == Some(parent) && n.entry.kind == EntryKind::Artifact)
            .map(|n| n.entry.name.clone())
            .collect();
        names.sort();
        Ok(names)
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn list_children(&self, query: &ChildQuery) -> Result<Vec<StoreEntry>> {
        let tree = self.read()?;
        tree.require_container(&query.parent)?;

        Ok(tree
            .nodes
            .values()
            .filter(|n| n.parent.as_ref() == Some(&query.parent) && query.matches(&n.entry))
            .map(|n| n.entry.clone())
            .collect())
    }

    async fn get_content(&self, id: &ArtifactId) -> Result<Vec<u8>> {
        let tree = self.read()?;
        match tree.nodes.get(id.as_str()) {
            Some(node) if node.entry.kind == EntryKind::Artifact => Ok(node.content.clone()),
            _ => Err(Error::NotFound(format!("Artifact not found: {}", id))),
        }
    }

    async fn content_kind(&self, id: &ArtifactId) -> Result<Option<String>> {
        let tree = self.read()?;
        match tree.nodes.get(id.as_str()) {
            Some(node) if node.entry.kind == EntryKind::Artifact => {
                Ok(node.entry.content_kind.clone())
            }
            _ => Err(Error::NotFound(format!("Artifact not found: {}", id))),
        }
    }

    async fn create_artifact(&self, req: CreateArtifactRequest) -> Result<ArtifactDescriptor> {
        let mut tree = self.write()?;
        tree.require_container(&req.parent)?;

        // Check and insert under the same write guard so creation is atomic.
        let taken = tree.nodes.values().any(|n| {
            n.parent.as_ref() == Some(&req.parent) && !n.entry.deleted && n.entry.name == req.name
        });
        if taken {
            return Err(Error::NameCollision {
                parent: req.parent.to_string(),
                name: req.name,
            });
        }

        let entry = tree.insert(
            &req.parent,
            &req.name,
            EntryKind::Artifact,
            req.content,
            Some(req.content_kind),
        )?;
        Ok(entry.into_descriptor(&req.parent))
    }
}
