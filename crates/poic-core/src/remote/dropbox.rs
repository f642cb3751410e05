//! Dropbox implementation of the remote file primitives
//!
//! Speaks the Dropbox HTTP API v2: JSON RPC endpoints on
//! `api.dropboxapi.com` and content endpoints on
//! `content.dropboxapi.com` with the usual `Dropbox-API-Arg` header.
//! A 401 anywhere maps to `Error::AuthRequired`; a 409 whose
//! `error_summary` names `not_found` means the path simply isn't there,
//! which list/delete treat as success.

use chrono::DateTime;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::auth::CredentialSource;
use crate::error::{Error, Result};
use crate::util::compact_text;

use super::{RemoteEntry, RemoteFiles};

const API_BASE: &str = "https://api.dropboxapi.com/2";
const CONTENT_BASE: &str = "https://content.dropboxapi.com/2";

/// Dropbox-backed `RemoteFiles`.
#[derive(Clone)]
pub struct DropboxFiles<C: CredentialSource> {
    client: Client,
    credentials: C,
}

impl<C: CredentialSource> DropboxFiles<C> {
    pub fn new(credentials: C) -> Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
            credentials,
        })
    }

    async fn bearer(&self) -> Result<String> {
        let token = self
            .credentials
            .access_token()
            .await?
            .ok_or(Error::AuthRequired)?;
        Ok(token.secret().to_string())
    }

    /// POST a JSON RPC endpoint.
    async fn rpc(&self, endpoint: &str, arg: &serde_json::Value) -> Result<Response> {
        let token = self.bearer().await?;
        let response = self
            .client
            .post(format!("{API_BASE}{endpoint}"))
            .bearer_auth(token)
            .json(arg)
            .send()
            .await?;
        Ok(response)
    }

    /// POST a content endpoint with the request described in the
    /// `Dropbox-API-Arg` header.
    async fn content(&self, endpoint: &str, arg: &serde_json::Value, body: String) -> Result<Response> {
        let token = self.bearer().await?;
        let response = self
            .client
            .post(format!("{CONTENT_BASE}{endpoint}"))
            .bearer_auth(token)
            .header("Dropbox-API-Arg", header_safe_json(arg))
            .header("Content-Type", "application/octet-stream")
            .body(body)
            .send()
            .await?;
        Ok(response)
    }
}

impl<C: CredentialSource> RemoteFiles for DropboxFiles<C> {
    async fn list_folder(&self, folder: &str) -> Result<Vec<RemoteEntry>> {
        let response = self
            .rpc(
                "/files/list_folder",
                &json!({ "path": folder, "recursive": false }),
            )
            .await?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            let body = response.text().await.unwrap_or_default();
            if is_not_found(&body) {
                // Folder not created yet: nothing synced so far.
                return Ok(Vec::new());
            }
            return Err(Error::Remote(parse_api_error(status, &body)));
        }

        let mut page: ListFolderPage = expect_json(response).await?;
        let mut entries = Vec::new();
        loop {
            entries.extend(page.entries.iter().filter_map(file_entry));
            if !page.has_more {
                break;
            }
            let response = self
                .rpc(
                    "/files/list_folder/continue",
                    &json!({ "cursor": page.cursor }),
                )
                .await?;
            page = expect_json(response).await?;
        }
        Ok(entries)
    }

    async fn read_text(&self, path: &str) -> Result<String> {
        let response = self
            .content("/files/download", &json!({ "path": path }), String::new())
            .await?;
        let response = expect_success(response).await?;
        Ok(response.text().await?)
    }

    async fn write_text(&self, path: &str, text: &str) -> Result<()> {
        let arg = json!({
            "path": path,
            "mode": "overwrite",
            "autorename": false,
            "mute": true,
            "strict_conflict": false,
        });
        let response = self
            .content("/files/upload", &arg, text.to_string())
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    async fn delete_entry(&self, path: &str) -> Result<()> {
        let response = self
            .rpc("/files/delete_v2", &json!({ "path": path }))
            .await?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            let body = response.text().await.unwrap_or_default();
            if is_not_found(&body) {
                // Already gone; deletion is idempotent.
                return Ok(());
            }
            return Err(Error::Remote(parse_api_error(status, &body)));
        }

        expect_success(response).await?;
        Ok(())
    }

    async fn move_entry(&self, from: &str, to: &str) -> Result<()> {
        let response = self
            .rpc(
                "/files/move_v2",
                &json!({ "from_path": from, "to_path": to, "autorename": false }),
            )
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    async fn create_folder(&self, folder: &str) -> Result<()> {
        let response = self
            .rpc(
                "/files/create_folder_v2",
                &json!({ "path": folder, "autorename": false }),
            )
            .await?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            // Folder already exists.
            response.text().await.ok();
            return Ok(());
        }

        expect_success(response).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ListFolderPage {
    entries: Vec<ListEntry>,
    cursor: String,
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct ListEntry {
    #[serde(rename = ".tag")]
    tag: String,
    name: String,
    path_display: Option<String>,
    path_lower: Option<String>,
    server_modified: Option<String>,
}

fn file_entry(entry: &ListEntry) -> Option<RemoteEntry> {
    if entry.tag != "file" {
        return None;
    }
    let path = entry
        .path_display
        .clone()
        .or_else(|| entry.path_lower.clone())
        .unwrap_or_else(|| entry.name.clone());
    let modified_at = entry
        .server_modified
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|date_time| date_time.timestamp_millis());
    Some(RemoteEntry {
        name: entry.name.clone(),
        path,
        modified_at,
    })
}

/// Check the response status, classifying 401 as an auth failure.
async fn expect_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(Error::AuthRequired);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Remote(parse_api_error(status, &body)));
    }
    Ok(response)
}

async fn expect_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    let response = expect_success(response).await?;
    Ok(response.json::<T>().await?)
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error_summary: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(summary) = payload.error_summary {
            return format!("{} ({})", summary.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn is_not_found(body: &str) -> bool {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|payload| payload.error_summary)
        .is_some_and(|summary| summary.contains("not_found"))
}

/// Serialize a `Dropbox-API-Arg` header value: HTTP headers cannot carry
/// raw non-ASCII, so those characters are `\uXXXX`-escaped.
fn header_safe_json(value: &serde_json::Value) -> String {
    let raw = value.to_string();
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_ascii() {
            out.push(ch);
        } else {
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_safe_json_escapes_non_ascii() {
        let arg = json!({ "path": "/cards/朝の振り返り.md" });
        let header = header_safe_json(&arg);
        assert!(header.is_ascii());
        assert!(header.contains("\\u671d"));
        assert!(header.contains("/cards/"));
    }

    #[test]
    fn header_safe_json_passes_ascii_through() {
        let arg = json!({ "path": "/cards/plain.md", "mode": "overwrite" });
        assert_eq!(header_safe_json(&arg), arg.to_string());
    }

    #[test]
    fn parse_api_error_prefers_summary() {
        let body = r#"{"error_summary": "path/not_found/..", "error": {".tag": "path"}}"#;
        let message = parse_api_error(StatusCode::CONFLICT, body);
        assert_eq!(message, "path/not_found/.. (409)");
    }

    #[test]
    fn parse_api_error_falls_back_to_body_text() {
        let message = parse_api_error(StatusCode::BAD_REQUEST, "Error in call");
        assert_eq!(message, "Error in call (400)");
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, "  "), "HTTP 502");
    }

    #[test]
    fn is_not_found_matches_lookup_errors() {
        assert!(is_not_found(
            r#"{"error_summary": "path_lookup/not_found/.."}"#
        ));
        assert!(!is_not_found(r#"{"error_summary": "too_many_requests/"}"#));
        assert!(!is_not_found("not json"));
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "Requires DROPBOX_ACCESS_TOKEN in the environment plus network access"]
    async fn dropbox_file_round_trip() {
        let _ = dotenvy::dotenv();
        let token = std::env::var("DROPBOX_ACCESS_TOKEN").expect("DROPBOX_ACCESS_TOKEN must be set");

        let credential = crate::auth::StoredCredential::with_token(
            crate::auth::BearerToken::new(token).expect("token must not be blank"),
        );
        let remote = DropboxFiles::new(credential).unwrap();

        let folder = "/poic-integration-test";
        let path = format!("{folder}/round-trip.md");

        remote.create_folder(folder).await.unwrap();
        remote.write_text(&path, "hello from the test").await.unwrap();

        let text = remote.read_text(&path).await.unwrap();
        assert_eq!(text, "hello from the test");

        let entries = remote.list_folder(folder).await.unwrap();
        assert!(entries.iter().any(|entry| entry.name == "round-trip.md"));

        remote.delete_entry(&path).await.unwrap();
        // Idempotent
        remote.delete_entry(&path).await.unwrap();
    }
}
