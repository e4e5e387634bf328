//! Request and response bodies of the compression API.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub(crate) struct AuthRequest<'a> {
    pub public_key: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AuthResponse {
    pub token: String,
}

/// Reply to `start/{tool}/{region}`: the task server assigned to this job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResponse {
    /// Host name of the task server, without scheme.
    pub server: String,
    pub task: String,
    #[serde(default)]
    pub remaining_credits: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub server_filename: String,
}

/// Body of the `process` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub task: String,
    pub tool: String,
    pub files: Vec<ProcessFile>,
    pub meta: DocumentMeta,
}

/// One uploaded file referenced by a `process` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessFile {
    pub server_filename: String,
    pub filename: String,
}

/// PDF metadata written into the output. The API expects capitalised keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMeta {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Author")]
    pub author: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub status: String,
    #[serde(default)]
    pub download_filename: Option<String>,
    #[serde(default)]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub output_filesize: Option<u64>,
    #[serde(default)]
    pub timer: Option<String>,
}
