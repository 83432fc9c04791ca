use anyhow::{bail, Context, Result};
use futures_util::StreamExt;
use guestvault_crypto::{PreviewKind, UploadPayload};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::config::CliConfig;
use crate::session::TransferSession;

/// Upper bound on buffer preallocation from a server-supplied length.
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

pub struct ApiClient {
    client: Client,
    base_url: Url,
    upload_path: String,
    csrf_token: Option<String>,
    admin_token: Option<String>,
}

// --- Request/Response types matching the server ---

#[derive(Debug, Clone, Deserialize)]
pub struct FileDetail {
    pub id: i64,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
    pub sha256: String,
    pub encrypted: bool,
    pub uploaded_at: String,
    pub download_count: i64,
    pub preview: PreviewKind,
    pub raw_url: String,
    pub download_url: String,
}

#[derive(Deserialize)]
struct ListResponse {
    files: Vec<FileDetail>,
}

#[derive(Serialize)]
struct BulkDeleteRequest<'a> {
    ids: &'a [i64],
}

#[derive(Deserialize)]
struct BulkDeleteResponse {
    deleted: usize,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    code: String,
    message: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .with_context(|| format!("invalid server endpoint: {base_url}"))?;
        Ok(Self {
            client: Client::new(),
            base_url,
            upload_path: "/upload".into(),
            csrf_token: None,
            admin_token: None,
        })
    }

    pub fn from_config(config: &CliConfig) -> Result<Self> {
        let mut api = Self::new(&config.server.endpoint)?
            .with_upload_path(&config.server.upload_path);
        if let Some(token) = &config.server.csrf_token {
            api = api.with_csrf_token(token);
        }
        if let Ok(token) = std::env::var(&config.server.admin_token_env) {
            api = api.with_admin_token(&token);
        }
        Ok(api)
    }

    pub fn with_upload_path(mut self, path: &str) -> Self {
        self.upload_path = path.to_string();
        self
    }

    pub fn with_csrf_token(mut self, token: &str) -> Self {
        self.csrf_token = Some(token.to_string());
        self
    }

    pub fn with_admin_token(mut self, token: &str) -> Self {
        self.admin_token = Some(token.to_string());
        self
    }

    /// Resolve a server path (or absolute URL) against the endpoint.
    pub fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("invalid URL path: {path}"))
    }

    /// POST the payload as `file` + `encrypted`. Returns the final URL after
    /// redirects, which is the uploaded file's detail page.
    ///
    /// Non-2xx is a failure and the body is not parsed.
    pub async fn upload(&self, payload: &UploadPayload) -> Result<Url> {
        let part = Part::bytes(payload.data.clone())
            .file_name(payload.filename.clone())
            .mime_str(&payload.content_type)
            .context("invalid content type")?;
        let form = Form::new()
            .text("encrypted", payload.encrypted_flag())
            .part("file", part);

        let mut req = self
            .client
            .post(self.url(&self.upload_path)?)
            .multipart(form);
        if let Some(token) = &self.csrf_token {
            req = req.header("X-CSRF-Token", token);
        }

        let resp = req.send().await.context("upload request failed")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("upload failed (HTTP {status})");
        }
        Ok(resp.url().clone())
    }

    /// GET /files/{id}
    pub async fn file_detail(&self, id: i64) -> Result<FileDetail> {
        self.file_detail_at(self.url(&format!("/files/{id}"))?).await
    }

    /// GET a detail URL as handed out after upload.
    pub async fn file_detail_at(&self, url: Url) -> Result<FileDetail> {
        let resp = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .context("failed to fetch file details")?;
        let resp = Self::check_response(resp).await?;
        resp.json().await.context("failed to parse file details")
    }

    /// GET /files
    pub async fn list_files(&self) -> Result<Vec<FileDetail>> {
        let resp = self
            .client
            .get(self.url("/files")?)
            .send()
            .await
            .context("failed to list files")?;
        let resp = Self::check_response(resp).await?;
        let parsed: ListResponse = resp.json().await.context("failed to parse list response")?;
        Ok(parsed.files)
    }

    /// POST /files/bulk-delete (admin).
    pub async fn bulk_delete(&self, ids: &[i64]) -> Result<usize> {
        let token = self
            .admin_token
            .as_deref()
            .context("admin token not set (required for deletion)")?;
        let resp = self
            .client
            .post(self.url("/files/bulk-delete")?)
            .bearer_auth(token)
            .json(&BulkDeleteRequest { ids })
            .send()
            .await
            .context("failed to delete files")?;
        let resp = Self::check_response(resp).await?;
        let parsed: BulkDeleteResponse = resp.json().await.context("failed to parse delete response")?;
        Ok(parsed.deleted)
    }

    /// Stream raw stored bytes, reporting progress through the session.
    pub async fn fetch_raw(&self, url: Url, session: &mut TransferSession) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .context("request failed")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("HTTP {status}");
        }

        let total = resp.content_length();
        session.begin(total);
        let mut data = Vec::with_capacity(total.unwrap_or(0).min(MAX_PREALLOC) as usize);
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("connection interrupted")?;
            session.record(chunk.len() as u64);
            data.extend_from_slice(&chunk);
        }
        Ok(data)
    }

    /// Check HTTP response status; extract API error body if present.
    async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let body_text = resp.text().await.unwrap_or_default();

        // Try to parse the API's structured error format
        if let Ok(api_err) = serde_json::from_str::<ApiErrorBody>(&body_text) {
            bail!(
                "API error (HTTP {}): [{}] {}",
                status,
                api_err.error.code,
                api_err.error.message
            );
        }

        bail!("API error (HTTP {}): {}", status, body_text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_paths() {
        let api = ApiClient::new("http://localhost:5000/").unwrap();
        assert_eq!(
            api.url("/raw/3").unwrap().as_str(),
            "http://localhost:5000/raw/3"
        );
        assert_eq!(
            api.url("https://cdn.example.org/raw/3").unwrap().as_str(),
            "https://cdn.example.org/raw/3"
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
