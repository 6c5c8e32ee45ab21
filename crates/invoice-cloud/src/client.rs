//! HTTP client for the remote file service.
//!
//! The service stores opaque files per account behind bearer-token auth.
//! A 401 from any endpoint invalidates the stored token, so the next call
//! fails fast with `AuthRequired` instead of hammering the service.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::{Arc, RwLock};

use crate::error::{CloudError, Result};

/// A file as listed by the remote service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerFile {
    pub id: i64,
    pub filename: String,
    pub created_at: String,
    pub file_size: u64,
}

/// Receipt returned by a successful upload.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadReceipt {
    pub file_id: i64,
    pub filename: String,
}

/// The remote file service as the reconciliation policy sees it.
#[async_trait]
pub trait RemoteFiles: Send + Sync {
    /// List every file stored for this account.
    async fn list_files(&self) -> Result<Vec<ServerFile>>;

    /// Upload a file under the given filename.
    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadReceipt>;

    /// Download a file's contents.
    async fn download(&self, id: i64) -> Result<Vec<u8>>;

    /// Delete a file.
    async fn delete(&self, id: i64) -> Result<()>;
}

/// Bearer-token session with explicit initialization (login) and teardown
/// (logout). Shared between the client and whoever owns the login UI.
#[derive(Default)]
pub struct CloudSession {
    token: RwLock<Option<String>>,
}

impl CloudSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_token(&self, token: String) {
        *self.token.write().unwrap() = Some(token);
    }

    pub fn clear_token(&self) {
        *self.token.write().unwrap() = None;
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().unwrap().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.read().unwrap().is_some()
    }
}

#[derive(Debug, Deserialize)]
pub struct UserInfo {
    pub id: i64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserInfo,
}

#[derive(Deserialize)]
struct FileListing {
    files: Vec<ServerFile>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// `RemoteFiles` over HTTP.
pub struct CloudClient {
    base_url: String,
    http: reqwest::Client,
    session: Arc<CloudSession>,
}

impl CloudClient {
    pub fn new(base_url: impl Into<String>, session: Arc<CloudSession>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            session,
        }
    }

    pub fn session(&self) -> Arc<CloudSession> {
        Arc::clone(&self.session)
    }

    /// Exchange credentials for a bearer token and store it in the session.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse> {
        let response = self
            .http
            .post(format!("{}/auth/login", self.base_url))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(CloudError::RemoteUnavailable(
                error_message(response, "login failed").await,
            ));
        }

        let auth: AuthResponse = response.json().await.map_err(transport_error)?;
        self.session.set_token(auth.token.clone());
        Ok(auth)
    }

    /// Create an account. Does not log in.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/auth/register", self.base_url))
            .json(&serde_json::json!({ "name": name, "email": email, "password": password }))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(CloudError::RemoteUnavailable(
                error_message(response, "registration failed").await,
            ));
        }
        Ok(())
    }

    /// Tear the session down. Purely local; the token is simply forgotten.
    pub fn logout(&self) {
        self.session.clear_token();
        tracing::info!("cloud session cleared");
    }

    fn bearer(&self, request: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        match self.session.token() {
            Some(token) => Ok(request.bearer_auth(token)),
            None => Err(CloudError::AuthRequired),
        }
    }

    /// Map non-success statuses, invalidating the token on a 401.
    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status() == StatusCode::UNAUTHORIZED {
            self.session.clear_token();
            return Err(CloudError::AuthRequired);
        }
        if !response.status().is_success() {
            return Err(CloudError::RemoteUnavailable(
                error_message(response, "request failed").await,
            ));
        }
        Ok(response)
    }
}

fn transport_error(err: reqwest::Error) -> CloudError {
    CloudError::RemoteUnavailable(err.to_string())
}

async fn error_message(response: reqwest::Response, fallback: &str) -> String {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(ErrorBody { error: Some(msg) }) => msg,
        _ => format!("{fallback} ({status})"),
    }
}

#[async_trait]
impl RemoteFiles for CloudClient {
    async fn list_files(&self) -> Result<Vec<ServerFile>> {
        let request = self.bearer(self.http.get(format!("{}/server-files", self.base_url)))?;
        let response = self
            .check(request.send().await.map_err(transport_error)?)
            .await?;
        let listing: FileListing = response.json().await.map_err(transport_error)?;
        Ok(listing.files)
    }

    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadReceipt> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("application/json")
            .map_err(transport_error)?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let request = self.bearer(
            self.http
                .post(format!("{}/server-files/upload", self.base_url)),
        )?;
        let response = self
            .check(
                request
                    .multipart(form)
                    .send()
                    .await
                    .map_err(transport_error)?,
            )
            .await?;
        response.json().await.map_err(transport_error)
    }

    async fn download(&self, id: i64) -> Result<Vec<u8>> {
        let request = self.bearer(
            self.http
                .get(format!("{}/server-files/download/{id}", self.base_url)),
        )?;
        let response = self
            .check(request.send().await.map_err(transport_error)?)
            .await?;
        Ok(response.bytes().await.map_err(transport_error)?.to_vec())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let request = self.bearer(
            self.http
                .delete(format!("{}/server-files/delete/{id}", self.base_url)),
        )?;
        self.check(request.send().await.map_err(transport_error)?)
            .await?;
        Ok(())
    }
}
