//! The four remote phases of one job.
//!
//! START → UPLOAD → PROCESS → DOWNLOAD, strictly in that order and each
//! through the [`TokenGuard`]. The source file is removed only after the
//! downloaded output is in place.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::{CompressApi, DocumentMeta, ProcessFile, ProcessRequest};
use crate::config::{AppPaths, Settings};
use crate::error::PressError;
use crate::guard::TokenGuard;
use crate::job::{Job, Phase};

/// A job that made it through every phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletedJob {
    pub filename: String,
    pub output: PathBuf,
    pub bytes: u64,
    /// Status string reported by the process call.
    pub status: String,
}

/// Where outputs go: the source area prefix of a job's directory is swapped
/// for the output area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub source_root: PathBuf,
    pub output_root: PathBuf,
}

impl OutputLayout {
    pub fn new(source_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            output_root: output_root.into(),
        }
    }

    pub fn destination(&self, job: &Job) -> Result<PathBuf, PressError> {
        let relative = job.source_dir.strip_prefix(&self.source_root).map_err(|_| {
            PressError::OutsideSourceArea(job.source_dir.clone(), self.source_root.clone())
        })?;
        Ok(self.output_root.join(relative).join(&job.new_name))
    }
}

impl From<&AppPaths> for OutputLayout {
    fn from(paths: &AppPaths) -> Self {
        Self::new(&paths.source_dir, &paths.output_dir)
    }
}

pub struct RemoteWorkflow<A> {
    api: Arc<A>,
    guard: Arc<TokenGuard<A>>,
    tool: String,
    region: String,
    layout: OutputLayout,
}

impl<A: CompressApi> RemoteWorkflow<A> {
    pub fn new(
        api: Arc<A>,
        guard: Arc<TokenGuard<A>>,
        settings: &Settings,
        layout: OutputLayout,
    ) -> Self {
        Self {
            api,
            guard,
            tool: settings.tool.clone(),
            region: settings.region.clone(),
            layout,
        }
    }

    pub fn guard(&self) -> &TokenGuard<A> {
        &self.guard
    }

    /// Runs every phase of `job`. On failure the error names the phase that
    /// failed and the source file is left in place.
    pub async fn run(&self, mut job: Job) -> Result<CompletedJob, PressError> {
        match self.drive(&mut job).await {
            Ok(done) => {
                info!(file = %done.filename, output = %done.output.display(), bytes = done.bytes, "compressed");
                Ok(done)
            }
            Err(source) => Err(PressError::Job {
                filename: job.filename,
                phase: job.phase,
                source: Box::new(source),
            }),
        }
    }

    async fn drive(&self, job: &mut Job) -> Result<CompletedJob, PressError> {
        let api = &*self.api;
        let (tool, region) = (self.tool.as_str(), self.region.as_str());
        let mut token = self.guard.current_token().await;

        job.phase = Phase::Start;
        let destination = self.layout.destination(job)?;
        let started = self
            .guard
            .call(&mut token, |t| async move { api.start(&t, tool, region).await })
            .await?;
        debug!(file = %job.filename, server = %started.server, task = %started.task, credits = ?started.remaining_credits, "task started");
        let (server, task) = (started.server.as_str(), started.task.as_str());

        job.advance();
        let source = job.source_path();
        let source_path = source.as_path();
        let uploaded = self
            .guard
            .call(&mut token, |t| async move {
                api.upload(&t, server, task, source_path).await
            })
            .await?;

        job.advance();
        let request = ProcessRequest {
            task: task.to_string(),
            tool: tool.to_string(),
            files: vec![ProcessFile {
                server_filename: uploaded.server_filename,
                filename: job.filename.clone(),
            }],
            meta: DocumentMeta {
                title: job.title.clone(),
                author: job.author.clone(),
            },
        };
        let request = &request;
        let processed = self
            .guard
            .call(&mut token, |t| async move { api.process(&t, server, request).await })
            .await?;
        debug!(file = %job.filename, status = %processed.status, "processed");

        job.advance();
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = partial_path(&destination);
        let partial_ref = partial.as_path();
        let downloaded = self
            .guard
            .call(&mut token, |t| async move {
                api.download(&t, server, task, partial_ref).await
            })
            .await;
        let bytes = match downloaded {
            Ok(bytes) => bytes,
            Err(err) => {
                discard(&partial).await;
                return Err(err);
            }
        };
        if let Err(err) = tokio::fs::rename(&partial, &destination).await {
            discard(&partial).await;
            return Err(err.into());
        }

        tokio::fs::remove_file(&source).await?;
        job.advance();

        Ok(CompletedJob {
            filename: job.filename.clone(),
            output: destination,
            bytes,
            status: processed.status,
        })
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

async fn discard(partial: &Path) {
    if let Err(err) = tokio::fs::remove_file(partial).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(file = %partial.display(), error = %err, "could not remove partial download");
        }
    }
}
