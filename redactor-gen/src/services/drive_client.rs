//! Google Drive client
//!
//! Articles are stored as Google Docs: the HTML body is uploaded with a
//! `multipart/related` request whose metadata asks Drive to convert it.

use async_trait::async_trait;
use redactor_common::config::DriveConfig;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::document_store::{DocumentStore, PersistenceError};
use crate::models::DocumentRef;

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const DOCUMENT_MIME_TYPE: &str = "application/vnd.google-apps.document";

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileEntry {
    id: String,
    #[serde(default)]
    web_view_link: Option<String>,
}

/// Drive v3 REST client
pub struct DriveClient {
    http_client: reqwest::Client,
    api_base_url: String,
    upload_base_url: String,
}

impl DriveClient {
    pub fn new(config: &DriveConfig) -> Result<Self, PersistenceError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| PersistenceError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            upload_base_url: config.upload_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, PersistenceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(PersistenceError::Unauthorized(body));
        }
        Err(PersistenceError::Api {
            status: status.as_u16(),
            message: body,
        })
    }
}

/// Drive query selecting a non-trashed folder by exact name
pub fn folder_query(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
    format!(
        "name = '{}' and mimeType = '{}' and trashed = false",
        escaped, FOLDER_MIME_TYPE
    )
}

/// `multipart/related` body: JSON metadata part, then the HTML media part
pub fn multipart_body(boundary: &str, metadata: &serde_json::Value, html: &str) -> String {
    format!(
        "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{meta}\r\n\
         --{b}\r\nContent-Type: text/html; charset=UTF-8\r\n\r\n{html}\r\n\
         --{b}--\r\n",
        b = boundary,
        meta = metadata,
        html = html,
    )
}

#[async_trait]
impl DocumentStore for DriveClient {
    async fn find_or_create_folder(
        &self,
        access_token: &str,
        name: &str,
    ) -> Result<String, PersistenceError> {
        let query = folder_query(name);
        let response = self
            .http_client
            .get(format!("{}/files", self.api_base_url))
            .bearer_auth(access_token)
            .query(&[
                ("q", query.as_str()),
                ("spaces", "drive"),
                ("fields", "files(id, name)"),
            ])
            .send()
            .await
            .map_err(|e| PersistenceError::Network(e.to_string()))?;

        let list: FileList = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| PersistenceError::Decode(e.to_string()))?;

        if let Some(folder) = list.files.into_iter().next() {
            debug!(folder = %name, folder_id = %folder.id, "Found target folder");
            return Ok(folder.id);
        }

        let response = self
            .http_client
            .post(format!("{}/files", self.api_base_url))
            .bearer_auth(access_token)
            .query(&[("fields", "id")])
            .json(&json!({ "name": name, "mimeType": FOLDER_MIME_TYPE }))
            .send()
            .await
            .map_err(|e| PersistenceError::Network(e.to_string()))?;

        let created: FileEntry = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| PersistenceError::Decode(e.to_string()))?;

        info!(folder = %name, folder_id = %created.id, "Created target folder");
        Ok(created.id)
    }

    async fn create_document(
        &self,
        access_token: &str,
        title: &str,
        html: &str,
        parent_id: &str,
    ) -> Result<DocumentRef, PersistenceError> {
        let boundary = format!("redactor-{}", Uuid::new_v4().simple());
        let metadata = json!({
            "name": title,
            "mimeType": DOCUMENT_MIME_TYPE,
            "parents": [parent_id],
        });

        let response = self
            .http_client
            .post(format!("{}/files", self.upload_base_url))
            .bearer_auth(access_token)
            .query(&[("uploadType", "multipart"), ("fields", "id,webViewLink")])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(multipart_body(&boundary, &metadata, html))
            .send()
            .await
            .map_err(|e| PersistenceError::Network(e.to_string()))?;

        let file: FileEntry = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| PersistenceError::Decode(e.to_string()))?;

        let link = file
            .web_view_link
            .unwrap_or_else(|| format!("https://docs.google.com/document/d/{}/edit", file.id));

        info!(document_id = %file.id, title = %title, "Document created");
        Ok(DocumentRef { id: file.id, link })
    }
}
