use chrono::{DateTime, Utc};
use pfind_finder::SaveReceipt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocateRequest {
    #[serde(rename = "accelerometerType")]
    pub accelerometer_type: String,
    #[serde(rename = "participantId")]
    pub participant_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccelerometersResponse {
    pub types: Vec<String>,
}

/// Query string of `POST /api/v1/containers/:id/versions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveVersionQuery {
    #[serde(rename = "baseFilename")]
    pub base_filename: String,
    #[serde(rename = "contentKind")]
    pub content_kind: Option<String>,
    #[serde(rename = "participantId")]
    pub participant_id: Option<String>,
    #[serde(rename = "accelerometerType")]
    pub accelerometer_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveVersionResponse {
    pub id: String,
    pub name: String,
    pub version: u64,
    pub attempts: u32,
    #[serde(rename = "viewLink")]
    pub view_link: Option<String>,
    #[serde(rename = "savedBy")]
    pub saved_by: String,
    #[serde(rename = "savedAt")]
    pub saved_at: DateTime<Utc>,
}

impl From<SaveReceipt> for SaveVersionResponse {
    fn from(receipt: SaveReceipt) -> Self {
        let descriptor = receipt.artifact.descriptor;
        Self {
            id: descriptor.id.to_string(),
            name: descriptor.name,
            version: receipt.artifact.version,
            attempts: receipt.artifact.attempts,
            view_link: descriptor.view_link,
            saved_by: receipt.saved_by,
            saved_at: receipt.saved_at,
        }
    }
}
