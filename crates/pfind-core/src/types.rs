//! Identifiers and value types shared by every pfind crate

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Opaque identifier of a container (folder) in the object store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContainerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ContainerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Opaque identifier of an artifact (file) in the object store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArtifactId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ArtifactId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Container,
    Artifact,
}

/// A child entry as listed by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreEntry {
    pub id: String,
    pub name: String,
    pub kind: EntryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_link: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl StoreEntry {
    /// Creation order used to break ties between same-named siblings.
    ///
    /// Earlier timestamps sort first, entries without a timestamp sort after
    /// all timestamped ones, and equal timestamps fall back to the id.
    pub fn creation_order(a: &StoreEntry, b: &StoreEntry) -> Ordering {
        match (a.created_at, b.created_at) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| a.id.cmp(&b.id))
    }

    pub fn into_descriptor(self, parent: &ContainerId) -> ArtifactDescriptor {
        ArtifactDescriptor {
            id: ArtifactId(self.id),
            name: self.name,
            parent: parent.clone(),
            content_kind: self.content_kind,
            view_link: self.view_link,
        }
    }
}

/// What callers get back for a located or freshly written artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    pub id: ArtifactId,
    pub name: String,
    pub parent: ContainerId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_link: Option<String>,
}

/// Structured name filter. Matching is always case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameFilter {
    Exact(String),
    Prefix(String),
}

impl NameFilter {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            NameFilter::Exact(expected) => name == expected,
            NameFilter::Prefix(prefix) => name.starts_with(prefix.as_str()),
        }
    }
}

/// A `listChildren` query: children of `parent`, optionally narrowed by name and kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildQuery {
    pub parent: ContainerId,
    pub name: Option<NameFilter>,
    pub kind: Option<EntryKind>,
    pub include_deleted: bool,
}

impl ChildQuery {
    pub fn children_of(parent: &ContainerId) -> Self {
        Self {
            parent: parent.clone(),
            name: None,
            kind: None,
            include_deleted: false,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(NameFilter::Exact(name.into()));
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name = Some(NameFilter::Prefix(prefix.into()));
        self
    }

    pub fn of_kind(mut self, kind: EntryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn including_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    /// Whether `entry` satisfies the name, kind and deletion criteria.
    ///
    /// The parent criterion is the backend's job; this only checks the entry itself.
    pub fn matches(&self, entry: &StoreEntry) -> bool {
        if entry.deleted && !self.include_deleted {
            return false;
        }
        if let Some(kind) = self.kind
            && entry.kind != kind
        {
            return false;
        }
        self.name
            .as_ref()
            .is_none_or(|filter| filter.matches(&entry.name))
    }
}

/// Ordered, root-relative container names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSpec {
    segments: Vec<String>,
}

impl PathSpec {
    /// Build a path, rejecting empty or whitespace-only segment names.
    pub fn new<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if let Some(index) = segments.iter().position(|s| s.trim().is_empty()) {
            return Err(Error::InvalidPath(format!(
                "segment {} is empty in {:?}",
                index, segments
            )));
        }
        Ok(Self { segments })
    }

    /// `{accelerometer}/{participant}/output_{participant}/results`
    pub fn participant_results(accelerometer_type: &str, participant_id: &str) -> Result<Self> {
        if participant_id.contains('/') {
            return Err(Error::InvalidPath(format!(
                "participant id '{}' must not contain '/'",
                participant_id
            )));
        }
        Self::new([
            accelerometer_type.to_string(),
            participant_id.to_string(),
            format!("output_{}", participant_id),
            "results".to_string(),
        ])
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for PathSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// How to choose between several same-named, non-deleted siblings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// Earliest creation timestamp wins; ties go to the smallest id.
    #[default]
    EarliestCreated,
    /// Treat the lookup as unresolvable.
    Reject,
}

impl AmbiguityPolicy {
    /// Pick one entry out of `candidates`, or `None` if the policy refuses.
    pub fn pick(self, mut candidates: Vec<StoreEntry>) -> Option<StoreEntry> {
        match candidates.len() {
            0 => None,
            1 => candidates.pop(),
            _ => match self {
                AmbiguityPolicy::EarliestCreated => {
                    candidates.into_iter().min_by(StoreEntry::creation_order)
                }
                AmbiguityPolicy::Reject => None,
            },
        }
    }
}

/// Split a filename on its last `.` into `(stem, ext)`.
///
/// A trailing dot yields no extension.
pub fn split_base_filename(base: &str) -> (&str, Option<&str>) {
    match base.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() => (stem, Some(ext)),
        Some((stem, _)) => (stem, None),
        None => (base, None),
    }
}

/// `{stem}_v{n}{.ext}` derived from a base filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedName {
    stem: String,
    ext: Option<String>,
    version: u64,
}

impl VersionedName {
    pub fn new(base_filename: &str, version: u64) -> Result<Self> {
        if version == 0 {
            return Err(Error::InvalidName("version numbers start at 1".into()));
        }
        let (stem, ext) = split_base_filename(base_filename);
        if stem.is_empty() || base_filename.contains('/') {
            return Err(Error::InvalidName(format!(
                "'{}' is not a usable base filename",
                base_filename
            )));
        }
        Ok(Self {
            stem: stem.to_string(),
            ext: ext.map(str::to_string),
            version,
        })
    }

    /// The literal `{stem}_v` every sibling version name starts with.
    pub fn prefix(&self) -> String {
        format!("{}_v", self.stem)
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn ext(&self) -> Option<&str> {
        self.ext.as_deref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// The same name one version higher, or `None` on overflow.
    pub fn next(&self) -> Option<Self> {
        self.version.checked_add(1).map(|version| Self {
            version,
            ..self.clone()
        })
    }
}

impl fmt::Display for VersionedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ext {
            Some(ext) => write!(f, "{}_v{}.{}", self.stem, self.version, ext),
            None => write!(f, "{}_v{}", self.stem, self.version),
        }
    }
}

/// MIME type used when a caller does not declare one.
pub fn content_kind_for(filename: &str) -> &'static str {
    match split_base_filename(filename).1.map(str::to_ascii_lowercase).as_deref() {
        Some("csv") => "text/csv",
        Some("pdf") => "application/pdf",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(id: &str, created: Option<i64>) -> StoreEntry {
        StoreEntry {
            id: id.to_string(),
            name: "ActiGraph".to_string(),
            kind: EntryKind::Container,
            content_kind: None,
            view_link: None,
            deleted: false,
            created_at: created.map(|s| Utc.timestamp_opt(s, 0).unwrap()),
        }
    }

    #[test]
    fn test_split_base_filename() {
        assert_eq!(split_base_filename("data.csv"), ("data", Some("csv")));
        assert_eq!(
            split_base_filename("archive.tar.gz"),
            ("archive.tar", Some("gz"))
        );
        assert_eq!(split_base_filename("README"), ("README", None));
        assert_eq!(split_base_filename("data."), ("data", None));
    }

    #[test]
    fn test_versioned_name_rendering() {
        let name = VersionedName::new("part4_nightsummary_sleep_cleaned.csv", 1).unwrap();
        assert_eq!(name.to_string(), "part4_nightsummary_sleep_cleaned_v1.csv");
        assert_eq!(name.prefix(), "part4_nightsummary_sleep_cleaned_v");

        let bare = VersionedName::new("notes", 4).unwrap();
        assert_eq!(bare.to_string(), "notes_v4");
        assert_eq!(bare.next().unwrap().to_string(), "notes_v5");
    }

    #[test]
    fn test_versioned_name_rejects_bad_input() {
        assert!(VersionedName::new("data.csv", 0).is_err());
        assert!(VersionedName::new(".csv", 1).is_err());
        assert!(VersionedName::new("a/b.csv", 1).is_err());
        assert!(VersionedName::new("data.csv", u64::MAX).unwrap().next().is_none());
    }

    #[test]
    fn test_path_spec_rejects_empty_segments() {
        assert!(PathSpec::new(["ActiGraph", "", "results"]).is_err());
        assert!(PathSpec::new(["ActiGraph", "  "]).is_err());

        let path = PathSpec::participant_results("ActiGraph", "PID123").unwrap();
        assert_eq!(path.to_string(), "ActiGraph/PID123/output_PID123/results");
        assert_eq!(path.len(), 4);

        assert!(PathSpec::participant_results("ActiGraph", "").is_err());
        assert!(PathSpec::participant_results("ActiGraph", "PID/1").is_err());
    }

    #[test]
    fn test_child_query_matching() {
        let mut e = entry("1", None);
        e.name = "data_v2.csv".into();
        e.kind = EntryKind::Artifact;

        let parent = ContainerId::new("c");
        assert!(ChildQuery::children_of(&parent).with_prefix("data_v").matches(&e));
        assert!(!ChildQuery::children_of(&parent).named("data.csv").matches(&e));
        assert!(
            !ChildQuery::children_of(&parent)
                .of_kind(EntryKind::Container)
                .matches(&e)
        );

        e.deleted = true;
        assert!(!ChildQuery::children_of(&parent).matches(&e));
        assert!(ChildQuery::children_of(&parent).including_deleted().matches(&e));
    }

    #[test]
    fn test_earliest_created_tie_break() {
        let picked = AmbiguityPolicy::EarliestCreated
            .pick(vec![entry("b", Some(20)), entry("c", None), entry("a", Some(30))])
            .unwrap();
        assert_eq!(picked.id, "b");

        let same_time = AmbiguityPolicy::EarliestCreated
            .pick(vec![entry("z", Some(5)), entry("m", Some(5))])
            .unwrap();
        assert_eq!(same_time.id, "m");

        assert!(
            AmbiguityPolicy::Reject
                .pick(vec![entry("a", Some(1)), entry("b", Some(2))])
                .is_none()
        );
        assert_eq!(
            AmbiguityPolicy::Reject
                .pick(vec![entry("only", None)])
                .unwrap()
                .id,
            "only"
        );
    }

    #[test]
    fn test_content_kind_for() {
        assert_eq!(content_kind_for("data.csv"), "text/csv");
        assert_eq!(content_kind_for("report.PDF"), "application/pdf");
        assert_eq!(content_kind_for("blob"), "application/octet-stream");
    }
}
