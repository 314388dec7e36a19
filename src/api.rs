// API client module: a small async HTTP client for the Seafile web API.
// It owns the base URL, the target repository id and the auth token, and
// turns each remote operation into one authenticated request.
//
// The token is written once by `authenticate` (which takes `&mut self`) and
// only read afterwards, so an authenticated client can be shared behind an
// `Arc` by concurrent tasks without locking.

use crate::config::Config;
use crate::error::{ApiError, Result};
use chrono::{DateTime, Utc};
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tokio_util::io::ReaderStream;
use tracing::debug;

/// Async Seafile client bound to a single repository.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    repo_id: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

/// One element of the JSON array returned by an upload with `ret-json=1`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub name: String,
    pub id: String,
    pub size: u64,
}

/// Share link descriptor minted by the service.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ShareLink {
    pub link: String,
    pub path: String,
    pub repo_id: String,
    #[serde(default)]
    pub is_expired: bool,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub view_cnt: u64,
    #[serde(default)]
    pub ctime: String,
    #[serde(default)]
    pub expire_date: serde_json::Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Dir,
}

/// A directory listing record. Snapshot only; not refreshed after listing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

/// Per-file metadata, including the modification time the listing lacks.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileDetail {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "mtime", with = "chrono::serde::ts_seconds")]
    pub modified_at: DateTime<Utc>,
}

/// Turns a repository file name into the root-relative path the API expects.
pub fn root_path(name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/{name}")
    }
}

fn transport(operation: &'static str) -> impl FnOnce(reqwest::Error) -> ApiError {
    move |source| ApiError::Transport { operation, source }
}

impl ApiClient {
    /// Create an unauthenticated client for `repo_id` on the server at `base_url`.
    pub fn new(base_url: &str, repo_id: &str) -> Result<Self> {
        Self::with_client(Client::builder(), base_url, repo_id)
    }

    /// Create a client from resolved configuration, honouring the optional
    /// per-request timeout.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Self::with_client(builder, &config.base_url, &config.repo_id)
    }

    fn with_client(builder: reqwest::ClientBuilder, base_url: &str, repo_id: &str) -> Result<Self> {
        let client = builder.build().map_err(transport("build http client"))?;
        Ok(ApiClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            repo_id: repo_id.to_string(),
            token: None,
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Exchange username and password for a token and keep it for all
    /// subsequent calls. Every failure, including an unreachable server, is
    /// an `Auth` error and leaves the client unauthenticated.
    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<()> {
        let url = format!("{}/api2/auth-token/", self.base_url);
        let res = self
            .client
            .post(&url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(|e| ApiError::Auth(format!("unable to reach the auth endpoint: {e}")))?;

        let status = res.status();
        if !status.is_success() {
            return Err(ApiError::Auth(format!("credentials rejected with status {status}")));
        }
        let body = res
            .bytes()
            .await
            .map_err(|e| ApiError::Auth(format!("unable to read token response: {e}")))?;
        let tok: TokenResponse = serde_json::from_slice(&body)
            .map_err(|e| ApiError::Auth(format!("malformed token response: {e}")))?;
        if tok.token.is_empty() {
            return Err(ApiError::Auth("service returned an empty token".into()));
        }

        debug!("obtained api token");
        self.token = Some(tok.token);
        Ok(())
    }

    /// Ask for a short-lived upload URL for the repository root.
    pub async fn upload_link(&self) -> Result<String> {
        let req = self.client.get(self.repo_url("upload-link/")).query(&[("p", "/")]);
        let res = self.send("upload-link", "/", req).await?;
        Self::json("upload-link", "/", res).await
    }

    /// Upload `local` into the repository root and return the service's
    /// description of what was stored. Checking that exactly one item came
    /// back is left to the caller (see `share::single_upload`).
    pub async fn upload_file(&self, local: impl AsRef<Path>) -> Result<Vec<UploadResult>> {
        let local = local.as_ref();
        let io_err = |source| ApiError::Io {
            path: local.to_path_buf(),
            source,
        };
        let file = tokio::fs::File::open(local).await.map_err(io_err)?;
        let len = file.metadata().await.map_err(io_err)?.len();
        let file_name = local
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("upload")
            .to_string();
        let remote_path = root_path(&file_name);

        let upload_url = self.upload_link().await?;

        // reqwest picks a random multipart boundary per form.
        let part = Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), len)
            .file_name(file_name);
        let form = Form::new().part("file", part).text("parent_dir", "/");

        let req = self
            .client
            .post(&upload_url)
            .query(&[("ret-json", "1")])
            .multipart(form);
        let res = self.send("upload", &remote_path, req).await?;
        Self::json("upload", &remote_path, res).await
    }

    /// Mint a public share link for a file in the repository root.
    pub async fn create_share_link(&self, remote_name: &str) -> Result<ShareLink> {
        let path = root_path(remote_name);
        let url = format!("{}/api/v2.1/share-links/", self.base_url);
        let req = self
            .client
            .post(&url)
            .form(&[("repo_id", self.repo_id.as_str()), ("path", path.as_str())]);
        let res = self.send("share-link", &path, req).await?;
        Self::json("share-link", &path, res).await
    }

    /// List the files (not directories) in the repository root.
    pub async fn list_directory(&self) -> Result<Vec<DirectoryEntry>> {
        let req = self.client.get(self.repo_url("dir/")).query(&[("t", "f")]);
        let res = self.send("list-dir", "/", req).await?;
        Self::json("list-dir", "/", res).await
    }

    pub async fn file_detail(&self, remote_name: &str) -> Result<FileDetail> {
        let path = root_path(remote_name);
        let req = self
            .client
            .get(self.repo_url("file/detail/"))
            .query(&[("p", path.as_str())]);
        let res = self.send("file-detail", &path, req).await?;
        if res.status() == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound { path });
        }
        Self::json("file-detail", &path, res).await
    }

    /// Delete a file. Only a 200 response counts as success.
    pub async fn delete_file(&self, remote_name: &str) -> Result<()> {
        let path = root_path(remote_name);
        let req = self
            .client
            .delete(self.repo_url("file/"))
            .query(&[("p", path.as_str())]);
        let res = self.send("DELETE", &path, req).await?;
        let status = res.status();
        if status != StatusCode::OK {
            return Err(ApiError::UnexpectedStatus {
                operation: "DELETE",
                path,
                status,
            });
        }
        Ok(())
    }

    fn repo_url(&self, suffix: &str) -> String {
        format!("{}/api2/repos/{}/{}", self.base_url, self.repo_id, suffix)
    }

    fn token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| ApiError::Auth("no token; authenticate before calling the api".into()))
    }

    async fn send(&self, operation: &'static str, path: &str, req: RequestBuilder) -> Result<Response> {
        let token = self.token()?;
        debug!(operation, path, "sending request");
        req.header(AUTHORIZATION, format!("Token {token}"))
            .send()
            .await
            .map_err(transport(operation))
    }

    async fn json<T: DeserializeOwned>(operation: &'static str, path: &str, res: Response) -> Result<T> {
        let status = res.status();
        if !status.is_success() {
            return Err(ApiError::UnexpectedStatus {
                operation,
                path: path.to_string(),
                status,
            });
        }
        let body = res.bytes().await.map_err(transport(operation))?;
        serde_json::from_slice(&body).map_err(|source| ApiError::Decode { operation, source })
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("repo_id", &self.repo_id)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
