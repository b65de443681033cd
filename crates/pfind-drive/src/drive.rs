//! Google Drive v3 backend

use crate::query::drive_query;
use crate::token::TokenCache;
use crate::{status_error, transport_error};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pfind_core::config::StoreConfig;
use pfind_core::{
    ArtifactDescriptor, ArtifactId, ChildQuery, CreateArtifactRequest, EntryKind,
    Error, ObjectStore, Result, StoreEntry,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;

/// MIME type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

const LIST_FIELDS: &str = "nextPageToken,files(id,name,mimeType,webViewLink,trashed,createdTime)";
const CREATE_FIELDS: &str = "id,name,mimeType,webViewLink";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileMetadata {
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    mime_type: Option<String>,
    web_view_link: Option<String>,
    #[serde(default)]
    trashed: bool,
    created_time: Option<DateTime<Utc>>,
}

impl DriveFile {
    fn into_entry(self) -> StoreEntry {
        let kind = if self.mime_type.as_deref() == Some(FOLDER_MIME_TYPE) {
            EntryKind::Container
        } else {
            EntryKind::Artifact
        };
        StoreEntry {
            id: self.id,
            name: self.name,
            kind,
            content_kind: self.mime_type,
            view_link: self.web_view_link,
            deleted: self.trashed,
            created_at: self.created_time,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

/// [`ObjectStore`] over the Drive v3 REST API.
///
/// Folders are containers, everything else is an artifact. Shared drives are
/// included in every call.
///
/// Drive allows duplicate names within a folder, so `create_artifact` checks
/// for an existing non-trashed entry with the exact name right before the
/// upload and reports [`Error::NameCollision`]. A writer that uploads between
/// that check and the upload is not detected, so two concurrent saves can
/// both land under the same version name. Only the in-memory and filesystem
/// stores create atomically.
pub struct DriveStore {
    client: Client,
    api_base: String,
    upload_base: String,
    page_size: u32,
    tokens: Arc<TokenCache>,
}

impl DriveStore {
    pub fn new(tokens: Arc<TokenCache>) -> Self {
        Self {
            client: Client::new(),
            api_base: "https://www.googleapis.com/drive/v3".to_string(),
            upload_base: "https://www.googleapis.com/upload/drive/v3".to_string(),
            page_size: 100,
            tokens,
        }
    }

    pub fn from_config(config: &StoreConfig, tokens: Arc<TokenCache>) -> Self {
        Self::new(tokens)
            .with_endpoints(&config.drive_api_base, &config.drive_upload_base)
            .with_page_size(config.page_size)
    }

    pub fn with_endpoints(mut self, api_base: &str, upload_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self.upload_base = upload_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, 1000);
        self
    }

    /// Send an authorized request and turn error statuses into store errors.
    async fn send(
        &self,
        what: &str,
        build: impl FnOnce(&Client) -> RequestBuilder,
    ) -> Result<Response> {
        let token = self.tokens.token().await?;
        let response = build(&self.client)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| transport_error(what, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, what, &body))
    }

    async fn list_page(&self, q: &str, page_token: Option<&str>) -> Result<FileList> {
        let url = format!("{}/files", self.api_base);
        let mut params = vec![
            ("q", q.to_string()),
            ("fields", LIST_FIELDS.to_string()),
            ("pageSize", self.page_size.to_string()),
            ("supportsAllDrives", "true".to_string()),
            ("includeItemsFromAllDrives", "true".to_string()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        let response = self
            .send("list files", |client| client.get(&url).query(&params))
            .await?;
        response
            .json::<FileList>()
            .await
            .map_err(|e| transport_error("decode file list", e))
    }
}

fn multipart_body(
    boundary: &str,
    metadata: &serde_json::Value,
    content_kind: &str,
    content: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(content.len() + 512);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!("--{boundary}\r\nContent-Type: {content_kind}\r\n\r\n").as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[async_trait]
impl ObjectStore for DriveStore {
    async fn list_children(&self, query: &ChildQuery) -> Result<Vec<StoreEntry>> {
        let q = drive_query(query);
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0u32;

        loop {
            let page = self.list_page(&q, page_token.as_deref()).await?;
            pages += 1;
            entries.extend(
                page.files
                    .into_iter()
                    .map(DriveFile::into_entry)
                    .filter(|entry| query.matches(entry)),
            );
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        tracing::debug!(q = %q, pages, matches = entries.len(), "drive listing");
        Ok(entries)
    }

    async fn get_content(&self, id: &ArtifactId) -> Result<Vec<u8>> {
        let url = format!("{}/files/{}", self.api_base, id);
        let what = format!("artifact {}", id);
        let response = self
            .send(&what, |client| {
                client
                    .get(&url)
                    .query(&[("alt", "media"), ("supportsAllDrives", "true")])
            })
            .await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error("download content", e))?;
        Ok(bytes.to_vec())
    }

    async fn content_kind(&self, id: &ArtifactId) -> Result<Option<String>> {
        let url = format!("{}/files/{}", self.api_base, id);
        let what = format!("artifact {}", id);
        let response = self
            .send(&what, |client| {
                client
                    .get(&url)
                    .query(&[("fields", "mimeType"), ("supportsAllDrives", "true")])
            })
            .await?;

        let metadata: FileMetadata = response
            .json()
            .await
            .map_err(|e| transport_error("decode file metadata", e))?;
        Ok(metadata.mime_type)
    }

    async fn create_artifact(&self, req: CreateArtifactRequest) -> Result<ArtifactDescriptor> {
        let existing = self
            .list_children(&ChildQuery::children_of(&req.parent).named(req.name.clone()))
            .await?;
        if !existing.is_empty() {
            return Err(Error::NameCollision {
                parent: req.parent.to_string(),
                name: req.name,
            });
        }

        let boundary = format!("pfind-{}", uuid::Uuid::new_v4().simple());
        let metadata = serde_json::json!({
            "name": req.name,
            "parents": [req.parent.as_str()],
            "mimeType": req.content_kind,
        });
        let body = multipart_body(&boundary, &metadata, &req.content_kind, &req.content);

        let url = format!("{}/files", self.upload_base);
        let response = self
            .send("upload file", |client| {
                client
                    .post(&url)
                    .query(&[
                        ("uploadType", "multipart"),
                        ("supportsAllDrives", "true"),
                        ("fields", CREATE_FIELDS),
                    ])
                    .header(
                        reqwest::header::CONTENT_TYPE,
                        format!("multipart/related; boundary={}", boundary),
                    )
                    .body(body)
            })
            .await?;

        let file: DriveFile = response
            .json()
            .await
            .map_err(|e| transport_error("decode created file", e))?;

        Ok(ArtifactDescriptor {
            id: ArtifactId::new(file.id),
            name: file.name,
            parent: req.parent,
            content_kind: file.mime_type.or(Some(req.content_kind)),
            view_link: file.web_view_link,
        })
    }
}
