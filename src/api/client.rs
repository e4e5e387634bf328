use std::future::Future;
use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use tokio::io::AsyncWriteExt;

use super::error::ApiError;
use super::types::{
    AuthRequest, AuthResponse, ProcessRequest, ProcessResponse, StartResponse, UploadResponse,
};
use crate::config::Settings;

/// Path prefix of every endpoint on a task server.
const SERVER_API_PREFIX: &str = "v1";

/// The remote calls a compression job is made of.
///
/// Implemented by [`CompressClient`] for the real service; tests drive the
/// workflow and the token guard through their own implementations.
pub trait CompressApi: Send + Sync {
    /// Exchanges a public key for a bearer token.
    fn authenticate(
        &self,
        public_key: &str,
    ) -> impl Future<Output = Result<String, ApiError>> + Send;

    fn start(
        &self,
        token: &str,
        tool: &str,
        region: &str,
    ) -> impl Future<Output = Result<StartResponse, ApiError>> + Send;

    fn upload(
        &self,
        token: &str,
        server: &str,
        task: &str,
        file: &Path,
    ) -> impl Future<Output = Result<UploadResponse, ApiError>> + Send;

    fn process(
        &self,
        token: &str,
        server: &str,
        request: &ProcessRequest,
    ) -> impl Future<Output = Result<ProcessResponse, ApiError>> + Send;

    /// Streams the task output into `dest`, returning the number of bytes written.
    fn download(
        &self,
        token: &str,
        server: &str,
        task: &str,
        dest: &Path,
    ) -> impl Future<Output = Result<u64, ApiError>> + Send;
}

pub struct CompressClient {
    client: Client,
    base_url: String,
    server_scheme: String,
}

impl CompressClient {
    /// Builds a client for `base_url` (e.g. `https://api.ilovepdf.com/v1`).
    /// Task servers returned by `start` are reached with `server_scheme`.
    pub fn new(
        base_url: impl Into<String>,
        server_scheme: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            server_scheme: server_scheme.into(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ApiError> {
        Self::new(
            settings.api_base_url.clone(),
            settings.server_scheme.clone(),
            Duration::from_secs(settings.connect_timeout_secs),
            Duration::from_secs(settings.request_timeout_secs),
        )
    }

    fn server_url(&self, server: &str, path: &str) -> String {
        format!(
            "{}://{}/{SERVER_API_PREFIX}/{path}",
            self.server_scheme, server
        )
    }
}

/// Maps 401 to [`ApiError::Unauthorized`] and any other failure status to
/// [`ApiError::Status`] carrying the body.
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }

    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        return Err(ApiError::Status {
            status: status.as_u16(),
            body,
        });
    }

    Ok(response)
}

impl CompressApi for CompressClient {
    async fn authenticate(&self, public_key: &str) -> Result<String, ApiError> {
        let response = self
            .client
            .post(format!("{}/auth", self.base_url))
            .json(&AuthRequest { public_key })
            .send()
            .await?;

        let body = check_status(response).await?.json::<AuthResponse>().await?;
        Ok(body.token)
    }

    async fn start(&self, token: &str, tool: &str, region: &str) -> Result<StartResponse, ApiError> {
        let response = self
            .client
            .get(format!("{}/start/{tool}/{region}", self.base_url))
            .bearer_auth(token)
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }

    async fn upload(
        &self,
        token: &str,
        server: &str,
        task: &str,
        file: &Path,
    ) -> Result<UploadResponse, ApiError> {
        let bytes = tokio::fs::read(file).await?;
        let filename = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let form = Form::new()
            .text("task", task.to_string())
            .part("file", Part::bytes(bytes).file_name(filename));

        let response = self
            .client
            .post(self.server_url(server, "upload"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }

    async fn process(
        &self,
        token: &str,
        server: &str,
        request: &ProcessRequest,
    ) -> Result<ProcessResponse, ApiError> {
        let response = self
            .client
            .post(self.server_url(server, "process"))
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }

    async fn download(
        &self,
        token: &str,
        server: &str,
        task: &str,
        dest: &Path,
    ) -> Result<u64, ApiError> {
        let response = self
            .client
            .get(self.server_url(server, &format!("download/{task}")))
            .bearer_auth(token)
            .send()
            .await?;
        let mut response = check_status(response).await?;

        let mut out = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            out.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        out.flush().await?;

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> CompressClient {
        CompressClient::new(
            format!("{}/v1", server.uri()),
            "http",
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn server_url_uses_scheme_and_prefix() {
        let client = CompressClient::new(
            "https://api.example.com/v1/",
            "https",
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(client.base_url, "https://api.example.com/v1");
        assert_eq!(
            client.server_url("api8.example.com", "upload"),
            "https://api8.example.com/v1/upload"
        );
    }

    #[tokio::test]
    async fn authenticate_posts_public_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/auth"))
            .and(body_json(serde_json::json!({"public_key": "project_public_1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "tok-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let token = client_for(&server).authenticate("project_public_1").await.unwrap();
        assert_eq!(token, "tok-1");
    }

    #[tokio::test]
    async fn start_maps_401_to_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/start/compress/us"))
            .and(header("authorization", "Bearer stale"))
            .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
            .mount(&server)
            .await;

        let err = client_for(&server).start("stale", "compress", "us").await.unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn other_failures_keep_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/start/compress/us"))
            .respond_with(ResponseTemplate::new(429).set_body_string("no credits left"))
            .mount(&server)
            .await;

        let err = client_for(&server).start("tok", "compress", "us").await.unwrap_err();
        match err {
            ApiError::Status { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "no credits left");
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn download_streams_body_to_file() {
        let server = MockServer::start().await;
        let address = server.address().to_string();
        Mock::given(method("GET"))
            .and(path("/v1/download/task-9"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7 small".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.pdf");
        let written = client_for(&server)
            .download("tok", &address, "task-9", &dest)
            .await
            .unwrap();

        assert_eq!(written, 14);
        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF-1.7 small");
    }
}
