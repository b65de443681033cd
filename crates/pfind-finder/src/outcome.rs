//! Values returned by [`crate::ParticipantFinder`]

use chrono::{DateTime, Utc};
use pfind_core::{ArtifactDescriptor, ContainerId};
use pfind_versioning::VersionedArtifact;
use serde::{Deserialize, Serialize};

/// Identifies a participant within an accelerometer type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRef {
    pub accelerometer_type: String,
    pub participant_id: String,
}

impl ParticipantRef {
    pub fn new(accelerometer_type: impl Into<String>, participant_id: impl Into<String>) -> Self {
        Self {
            accelerometer_type: accelerometer_type.into(),
            participant_id: participant_id.into(),
        }
    }
}

/// The files found in a participant's `results` container.
///
/// Each slot is `None` when that file is absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantFiles {
    pub container: ContainerId,
    pub editable: Option<ArtifactDescriptor>,
    pub read_only: [Option<ArtifactDescriptor>; 2],
}

/// Result of a participant lookup. Missing folders are an expected outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LocateOutcome {
    Found(ParticipantFiles),
    FolderMissing {
        index: usize,
        segment: String,
    },
    FolderAmbiguous {
        index: usize,
        segment: String,
        candidates: usize,
    },
}

impl LocateOutcome {
    pub fn files(&self) -> Option<&ParticipantFiles> {
        match self {
            LocateOutcome::Found(files) => Some(files),
            _ => None,
        }
    }
}

/// A completed save and who made it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    pub artifact: VersionedArtifact,
    pub saved_by: String,
    pub saved_at: DateTime<Utc>,
}

/// Downloaded artifact bytes with the MIME type to serve them as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub content_kind: String,
    pub content: Vec<u8>,
}
