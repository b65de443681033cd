//! Next-version allocation from sibling names

use pfind_core::{ChildQuery, ContainerId, EntryKind, ObjectStore, Result, VersionedName};
use std::sync::Arc;

/// A sibling whose name starts with the version prefix but carries no usable number.
#[derive(Debug, PartialEq, Eq)]
struct MalformedName;

/// Parse `n` out of `{stem}_v{n}{.ext}`; only ASCII digits are accepted for `n`.
fn parse_version(
    template: &VersionedName,
    candidate: &str,
) -> std::result::Result<u64, MalformedName> {
    let rest = candidate
        .strip_prefix(template.prefix().as_str())
        .ok_or(MalformedName)?;

    let digits = match template.ext() {
        Some(ext) => rest
            .strip_suffix(ext)
            .and_then(|r| r.strip_suffix('.'))
            .ok_or(MalformedName)?,
        None => rest,
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MalformedName);
    }
    digits.parse().map_err(|_| MalformedName)
}

/// Computes the next unused version number for a base filename.
///
/// This is a full rescan of the container and is only meaningful right before
/// a create; [`crate::VersionedWriter`] handles the race with other writers.
#[derive(Clone)]
pub struct VersionAllocator {
    store: Arc<dyn ObjectStore>,
}

impl VersionAllocator {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// `max(existing versions) + 1`, or `1` when there are none.
    ///
    /// Deleted siblings still count, so a number is never handed out twice.
    pub async fn next_version(&self, container: &ContainerId, base_filename: &str) -> Result<u64> {
        let template = VersionedName::new(base_filename, 1)?;
        let query = ChildQuery::children_of(container)
            .with_prefix(template.prefix())
            .of_kind(EntryKind::Artifact)
            .including_deleted();

        let siblings = self.store.list_children(&query).await?;

        let highest = siblings
            .iter()
            .filter_map(|entry| match parse_version(&template, &entry.name) {
                Ok(version) => Some(version),
                Err(MalformedName) => {
                    tracing::trace!(name = %entry.name, "ignoring non-version sibling");
                    None
                }
            })
            .max()
            .unwrap_or(0);

        let next = highest.checked_add(1).ok_or_else(|| pfind_core::Error::VersionConflict {
            base_filename: base_filename.to_string(),
            attempts: 0,
            last_name: template.to_string(),
        })?;

        tracing::debug!(
            container = %container,
            base_filename,
            siblings = siblings.len(),
            next,
            "allocated version"
        );
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pfind_store::InMemoryObjectStore;

    fn template(base: &str) -> VersionedName {
        VersionedName::new(base, 1).unwrap()
    }

    #[test]
    fn test_parse_version() {
        let csv = template("data.csv");
        assert_eq!(parse_version(&csv, "data_v7.csv"), Ok(7));
        assert_eq!(parse_version(&csv, "data_v007.csv"), Ok(7));
        assert_eq!(parse_version(&csv, "data_version_report.csv"), Err(MalformedName));
        assert_eq!(parse_version(&csv, "data_v.csv"), Err(MalformedName));
        assert_eq!(parse_version(&csv, "data_v3.csv.bak"), Err(MalformedName));
        assert_eq!(parse_version(&csv, "data_v3xcsv"), Err(MalformedName));
        assert_eq!(parse_version(&csv, "data_v-1.csv"), Err(MalformedName));
        assert_eq!(parse_version(&csv, "data_v+1.csv"), Err(MalformedName));
        assert_eq!(
            parse_version(&csv, "data_v99999999999999999999999.csv"),
            Err(MalformedName)
        );
        assert_eq!(parse_version(&csv, "other_v1.csv"), Err(MalformedName));

        let bare = template("notes");
        assert_eq!(parse_version(&bare, "notes_v12"), Ok(12));
        assert_eq!(parse_version(&bare, "notes_v12.txt"), Err(MalformedName));
    }

    #[tokio::test]
    async fn test_next_version_skips_unrelated_names() {
        let store = InMemoryObjectStore::new();
        let root = store.root();
        for name in [
            "data.csv",
            "data_v1.csv",
            "data_v2.csv",
            "data_v7.csv",
            "data_version_report.csv",
        ] {
            store.add_artifact(&root, name, "x").unwrap();
        }

        let allocator = VersionAllocator::new(Arc::new(store));
        assert_eq!(allocator.next_version(&root, "data.csv").await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_next_version_starts_at_one() {
        let store = InMemoryObjectStore::new();
        let root = store.root();
        store.add_artifact(&root, "data.csv", "x").unwrap();
        store.add_artifact(&root, "data_version_report.csv", "x").unwrap();
        store.add_artifact(&root, "other_v4.csv", "x").unwrap();

        let allocator = VersionAllocator::new(Arc::new(store));
        assert_eq!(allocator.next_version(&root, "data.csv").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_extension_must_match() {
        let store = InMemoryObjectStore::new();
        let root = store.root();
        store.add_artifact(&root, "data_v5.pdf", "x").unwrap();
        store.add_artifact(&root, "data_v2.csv", "x").unwrap();

        let allocator = VersionAllocator::new(Arc::new(store));
        assert_eq!(allocator.next_version(&root, "data.csv").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_deleted_versions_still_count() {
        let store = InMemoryObjectStore::new();
        let root = store.root();
        store.add_artifact(&root, "data_v1.csv", "x").unwrap();
        let v2 = store.add_artifact(&root, "data_v2.csv", "x").unwrap();
        store.mark_deleted(v2.as_str()).unwrap();

        let allocator = VersionAllocator::new(Arc::new(store));
        assert_eq!(allocator.next_version(&root, "data.csv").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_invalid_base_filename() {
        let store = InMemoryObjectStore::new();
        let root = store.root();
        let allocator = VersionAllocator::new(Arc::new(store));

        assert!(matches!(
            allocator.next_version(&root, ".csv").await,
            Err(pfind_core::Error::InvalidName(_))
        ));
    }
}
