//! Microsoft Graph drive connector for workbooks kept on SharePoint/OneDrive.

use std::fmt;
use std::time::Duration;

use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{RemoteError, RemoteErrorKind, RemoteStore};
use crate::util::{compact_text, is_http_url, normalize_text_option};
use crate::{Error, Result};

pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const HTTP_TIMEOUT_SECS: u64 = 60;
/// Files above this size must go through an upload session.
const SIMPLE_UPLOAD_LIMIT: usize = 4 * 1024 * 1024;
/// Upload session chunks must be a multiple of 320 KiB.
const UPLOAD_CHUNK_SIZE: usize = 10 * 320 * 1024;

/// Connection settings for a Graph drive.
#[derive(Clone, PartialEq, Eq)]
pub struct GraphConfig {
    pub base_url: String,
    pub drive_id: String,
    pub access_token: String,
}

impl fmt::Debug for GraphConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("GraphConfig")
            .field("base_url", &self.base_url)
            .field("drive_id", &self.drive_id)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// Graph-backed [`RemoteStore`] addressing files by drive-relative path.
#[derive(Debug, Clone)]
pub struct GraphDriveStore {
    config: GraphConfig,
    client: Client,
}

impl GraphDriveStore {
    pub fn new(config: GraphConfig) -> Result<Self> {
        let base_url = normalize_text_option(Some(config.base_url))
            .unwrap_or_else(|| DEFAULT_GRAPH_BASE_URL.to_string());
        if !is_http_url(&base_url) {
            return Err(Error::Config(
                "Graph base URL must include http:// or https://".to_string(),
            ));
        }
        let drive_id = normalize_text_option(Some(config.drive_id))
            .ok_or_else(|| Error::Config("Graph drive id must not be empty".to_string()))?;
        let access_token = normalize_text_option(Some(config.access_token))
            .ok_or_else(|| Error::Config("Graph access token must not be empty".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|error| Error::Config(format!("Failed to construct HTTP client: {error}")))?;

        Ok(Self {
            config: GraphConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                drive_id,
                access_token,
            },
            client,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &GraphConfig {
        &self.config
    }

    fn item_url(&self, path: &str) -> String {
        format!(
            "{}/drives/{}/root:/{}:",
            self.config.base_url,
            urlencoding::encode(&self.config.drive_id),
            encode_path(path)
        )
    }

    async fn upload_in_session(
        &self,
        path: &str,
        content: &[u8],
        conflict_behavior: &str,
    ) -> std::result::Result<(), RemoteError> {
        let response = self
            .client
            .post(format!("{}/createUploadSession", self.item_url(path)))
            .bearer_auth(&self.config.access_token)
            .json(&serde_json::json!({
                "item": { "@microsoft.graph.conflictBehavior": conflict_behavior }
            }))
            .send()
            .await
            .map_err(|error| transport_error("createUploadSession", path, &error))?;
        if !response.status().is_success() {
            return Err(response_error(response, "createUploadSession", path).await);
        }
        let session = response
            .json::<UploadSession>()
            .await
            .map_err(|error| transport_error("createUploadSession", path, &error))?;

        let total = content.len();
        for (index, chunk) in content.chunks(UPLOAD_CHUNK_SIZE).enumerate() {
            let start = index * UPLOAD_CHUNK_SIZE;
            let end = start + chunk.len() - 1;
            // The upload URL is pre-authenticated; Graph rejects a bearer token on it.
            let response = self
                .client
                .put(&session.upload_url)
                .header(CONTENT_LENGTH, chunk.len())
                .header(CONTENT_RANGE, format!("bytes {start}-{end}/{total}"))
                .body(chunk.to_vec())
                .send()
                .await
                .map_err(|error| transport_error("upload chunk", path, &error))?;
            if !response.status().is_success() {
                return Err(response_error(response, "upload chunk", path).await);
            }
        }

        Ok(())
    }
}

impl RemoteStore for GraphDriveStore {
    async fn download(&self, path: &str) -> std::result::Result<Vec<u8>, RemoteError> {
        let response = self
            .client
            .get(format!("{}/content", self.item_url(path)))
            .bearer_auth(&self.config.access_token)
            .send()
            .await
            .map_err(|error| transport_error("download", path, &error))?;

        if !response.status().is_success() {
            return Err(response_error(response, "download", path).await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|error| transport_error("download body", path, &error))?;
        tracing::debug!(path, size = bytes.len(), "Downloaded workbook from Graph");
        Ok(bytes.to_vec())
    }

    async fn upload(
        &self,
        path: &str,
        content: &[u8],
        overwrite: bool,
    ) -> std::result::Result<(), RemoteError> {
        let conflict_behavior = if overwrite { "replace" } else { "fail" };

        if content.len() > SIMPLE_UPLOAD_LIMIT {
            return self
                .upload_in_session(path, content, conflict_behavior)
                .await;
        }

        let response = self
            .client
            .put(format!("{}/content", self.item_url(path)))
            .query(&[("@microsoft.graph.conflictBehavior", conflict_behavior)])
            .bearer_auth(&self.config.access_token)
            .header(CONTENT_TYPE, XLSX_CONTENT_TYPE)
            .body(content.to_vec())
            .send()
            .await
            .map_err(|error| transport_error("upload", path, &error))?;

        if !response.status().is_success() {
            return Err(response_error(response, "upload", path).await);
        }

        tracing::debug!(path, size = content.len(), "Uploaded workbook to Graph");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadSession {
    upload_url: String,
}

#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    error: Option<GraphErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GraphErrorDetail {
    code: Option<String>,
    message: Option<String>,
}

/// Graph error codes that refine the status-based classification.
fn kind_from_graph_code(code: &str) -> Option<RemoteErrorKind> {
    match code {
        "resourceLocked" | "resourceModified" | "nameAlreadyExists" => {
            Some(RemoteErrorKind::VersionConflict)
        }
        "activityLimitReached" | "throttledRequest" | "quotaLimitReached" => {
            Some(RemoteErrorKind::RateLimited)
        }
        "itemNotFound" => Some(RemoteErrorKind::NotFound),
        "accessDenied" | "unauthenticated" | "InvalidAuthenticationToken" => {
            Some(RemoteErrorKind::Unauthorized)
        }
        _ => None,
    }
}

fn classify_response(status: StatusCode, body: &str, operation: &str, path: &str) -> RemoteError {
    let detail = serde_json::from_str::<GraphErrorBody>(body)
        .ok()
        .and_then(|payload| payload.error);
    let code = detail.as_ref().and_then(|detail| detail.code.clone());
    let message = detail
        .and_then(|detail| detail.message)
        .map(|message| compact_text(&message))
        .filter(|message| !message.is_empty())
        .or_else(|| Some(compact_text(body)).filter(|text| !text.is_empty()))
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    let mut error = RemoteError::from_status(
        status.as_u16(),
        format!("Graph {operation} failed for {path}: {message}"),
    );
    if let Some(kind) = code.as_deref().and_then(kind_from_graph_code) {
        error.kind = kind;
    }
    error
}

async fn response_error(response: reqwest::Response, operation: &str, path: &str) -> RemoteError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    classify_response(status, &body, operation, path)
}

fn transport_error(operation: &str, path: &str, error: &reqwest::Error) -> RemoteError {
    RemoteError::new(
        RemoteErrorKind::Transport,
        format!("Graph {operation} failed for {path}: {error}"),
    )
}

/// Percent-encode each path segment, keeping the separators.
fn encode_path(path: &str) -> String {
    path.trim_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GraphConfig {
        GraphConfig {
            base_url: "https://graph.example.com/v1.0/".to_string(),
            drive_id: "b!drive".to_string(),
            access_token: "secret-token".to_string(),
        }
    }

    #[test]
    fn new_rejects_missing_values() {
        let mut missing_token = config();
        missing_token.access_token = "  ".to_string();
        assert!(matches!(
            GraphDriveStore::new(missing_token),
            Err(Error::Config(message)) if message.contains("access token")
        ));

        let mut bad_url = config();
        bad_url.base_url = "graph.example.com".to_string();
        assert!(GraphDriveStore::new(bad_url).is_err());
    }

    #[test]
    fn item_url_encodes_segments() {
        let store = GraphDriveStore::new(config()).unwrap();
        assert_eq!(
            store.item_url("/Documentos Compartilhados/QA/apontamentos.xlsx"),
            "https://graph.example.com/v1.0/drives/b%21drive/root:/Documentos%20Compartilhados/QA/apontamentos.xlsx:"
        );
    }

    #[test]
    fn config_debug_redacts_token() {
        let debug = format!("{:?}", config());
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn graph_error_code_overrides_status() {
        let body = r#"{"error":{"code":"resourceLocked","message":"The resource you are attempting to access is locked"}}"#;
        let error = classify_response(StatusCode::BAD_REQUEST, body, "upload", "a.xlsx");
        assert_eq!(error.kind, RemoteErrorKind::VersionConflict);
        assert_eq!(error.status, Some(400));
        assert!(error.message.contains("locked"));
    }

    #[test]
    fn status_classification_applies_without_body() {
        let error = classify_response(StatusCode::TOO_MANY_REQUESTS, "", "download", "a.xlsx");
        assert_eq!(error.kind, RemoteErrorKind::RateLimited);
        assert!(error.message.contains("HTTP 429"));

        let error = classify_response(StatusCode::NOT_FOUND, "not json", "download", "a.xlsx");
        assert_eq!(error.kind, RemoteErrorKind::NotFound);
        assert!(error.message.contains("not json"));
    }
}
