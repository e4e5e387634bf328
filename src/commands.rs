//! What each subcommand does, minus the printing.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::api::CompressClient;
use crate::config::{AppPaths, Settings};
use crate::dispatcher::{BatchReport, DispatchOptions, Dispatcher};
use crate::error::PressError;
use crate::guard::TokenGuard;
use crate::manifest::Manifest;
use crate::store::{ConfigStore, KeyInfo};
use crate::ui::BatchProgress;
use crate::workflow::{OutputLayout, RemoteWorkflow};

/// Writes a fresh manifest for the source area. Returns the number of files
/// queued; zero means nothing was written.
pub fn init(paths: &AppPaths, title: &str, author: &str, force: bool) -> Result<usize> {
    paths.ensure_dirs()?;
    if paths.manifest_file.exists() && !force {
        return Err(PressError::ManifestExists(paths.manifest_file.clone()).into());
    }

    let manifest = Manifest::build(&paths.source_dir, title, author)
        .with_context(|| format!("failed to scan {}", paths.source_dir.display()))?;
    if manifest.is_empty() {
        return Ok(0);
    }

    manifest.save(&paths.manifest_file)?;
    info!(files = manifest.len(), manifest = %paths.manifest_file.display(), "manifest written");
    Ok(manifest.len())
}

/// Runs the whole manifest through the pool. The manifest is deleted
/// afterwards whatever the outcome; failed files stay in the source area.
pub async fn compress(paths: &AppPaths, settings: &Settings, show_progress: bool) -> Result<BatchReport> {
    let manifest = Manifest::load(&paths.manifest_file)?;
    let store = ConfigStore::load(&paths.key_file)?;
    std::fs::create_dir_all(&paths.output_dir)?;

    let api = Arc::new(CompressClient::from_settings(settings)?);
    let guard = Arc::new(TokenGuard::new(api.clone(), store));
    let workflow = Arc::new(RemoteWorkflow::new(
        api,
        guard,
        settings,
        OutputLayout::from(paths),
    ));

    let progress = if show_progress {
        BatchProgress::start(manifest.len() as u64)
    } else {
        BatchProgress::hidden()
    };
    let dispatcher =
        Dispatcher::new(workflow, DispatchOptions::from(settings)).with_progress(progress.clone());

    info!(jobs = manifest.len(), workers = settings.workers, "batch starting");
    let report = dispatcher.run(manifest.into_source()).await;
    progress.finish();
    info!(
        completed = report.completed.len(),
        failed = report.errors.len(),
        skipped = report.skipped,
        refreshes = report.refreshes,
        "batch finished"
    );

    Manifest::remove(&paths.manifest_file)?;
    Ok(report)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub root: PathBuf,
    /// Manifest entries whose file is present; `None` without a manifest.
    pub pending: Option<usize>,
    pub vanished: usize,
    pub active_key: Option<String>,
    pub key_count: usize,
}

pub fn status(paths: &AppPaths) -> Result<Status> {
    let (pending, vanished) = match Manifest::load(&paths.manifest_file) {
        Ok(manifest) => {
            let total = manifest.len();
            let present = manifest
                .entries()
                .filter(|(name, entry)| entry.path.join(name).is_file())
                .count();
            (Some(present), total - present)
        }
        Err(PressError::ManifestNotFound(_)) => (None, 0),
        Err(e) => return Err(e.into()),
    };

    let store = ConfigStore::read(&paths.key_file)?;
    Ok(Status {
        root: paths.root.clone(),
        pending,
        vanished,
        active_key: store.key_info().map(|info| mask_key(&info.key)),
        key_count: store.keys().len(),
    })
}

pub fn keys_list(paths: &AppPaths) -> Result<Vec<KeyInfo>> {
    Ok(ConfigStore::read(&paths.key_file)?.keys().to_vec())
}

pub fn keys_add(paths: &AppPaths, key: &str) -> Result<()> {
    let mut store = ConfigStore::load_or_default(&paths.key_file)?;
    store.add_key(key)?;
    Ok(())
}

pub fn keys_use(paths: &AppPaths, key: &str) -> Result<()> {
    let mut store = ConfigStore::load(&paths.key_file)?;
    store.activate(key)?;
    Ok(())
}

/// Shows only the start of a key.
pub fn mask_key(key: &str) -> String {
    let visible: String = key.chars().take(8).collect();
    if visible.len() < key.len() {
        format!("{visible}…")
    } else {
        visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> (tempfile::TempDir, AppPaths) {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::under(dir.path());
        (dir, paths)
    }

    #[test]
    fn init_writes_manifest_and_refuses_to_overwrite() {
        let (_dir, paths) = layout();
        paths.ensure_dirs().unwrap();
        std::fs::write(paths.source_dir.join("Un Informe.pdf"), b"%PDF").unwrap();

        assert_eq!(init(&paths, "filename", "Ana", false).unwrap(), 1);
        let manifest = Manifest::load(&paths.manifest_file).unwrap();
        let (_, entry) = manifest.entries().next().unwrap();
        assert_eq!(entry.new_name, "un-informe.pdf");
        assert_eq!(entry.title, "Un Informe");

        let err = init(&paths, "", "", false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PressError>(),
            Some(PressError::ManifestExists(_))
        ));
        assert_eq!(init(&paths, "", "", true).unwrap(), 1);
    }

    #[test]
    fn init_with_no_pdfs_writes_nothing() {
        let (_dir, paths) = layout();
        assert_eq!(init(&paths, "", "", false).unwrap(), 0);
        assert!(!paths.manifest_file.exists());
        assert!(paths.output_dir.is_dir());
    }

    #[tokio::test]
    async fn compress_without_manifest_fails_at_startup() {
        let (_dir, paths) = layout();
        let err = compress(&paths, &Settings::default(), false).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PressError>(),
            Some(PressError::ManifestNotFound(_))
        ));
    }

    #[test]
    fn status_counts_pending_and_vanished() {
        let (_dir, paths) = layout();
        paths.ensure_dirs().unwrap();
        std::fs::write(paths.source_dir.join("a.pdf"), b"%PDF").unwrap();
        std::fs::write(paths.source_dir.join("b.pdf"), b"%PDF").unwrap();
        init(&paths, "", "", false).unwrap();
        std::fs::remove_file(paths.source_dir.join("b.pdf")).unwrap();
        keys_add(&paths, "project_public_0123456789").unwrap();

        let status = status(&paths).unwrap();
        assert_eq!(status.pending, Some(1));
        assert_eq!(status.vanished, 1);
        assert_eq!(status.active_key.as_deref(), Some("project_…"));
        assert_eq!(status.key_count, 1);
    }

    #[test]
    fn read_only_commands_leave_key_file_untouched() {
        let (_dir, paths) = layout();
        paths.ensure_dirs().unwrap();
        let body = r#"{"api_keys": [
            {"key": "first_key_123", "token": "", "status": true},
            {"key": "second_key_456", "token": "", "status": true}
        ]}"#;
        std::fs::write(&paths.key_file, body).unwrap();

        let status = status(&paths).unwrap();
        assert_eq!(status.active_key.as_deref(), Some("first_ke…"));
        let keys = keys_list(&paths).unwrap();
        assert_eq!(keys.iter().filter(|k| k.status).count(), 1);

        assert_eq!(std::fs::read_to_string(&paths.key_file).unwrap(), body);
    }

    #[test]
    fn keys_add_and_use() {
        let (_dir, paths) = layout();
        keys_add(&paths, "k1").unwrap();
        keys_add(&paths, "k2").unwrap();
        keys_use(&paths, "k2").unwrap();

        let keys = keys_list(&paths).unwrap();
        let active: Vec<_> = keys.iter().filter(|k| k.status).map(|k| k.key.as_str()).collect();
        assert_eq!(active, vec!["k2"]);
        assert!(keys_use(&paths, "missing").is_err());
    }

    #[test]
    fn mask_key_keeps_short_keys() {
        assert_eq!(mask_key("abc"), "abc");
        assert_eq!(mask_key("abcdefghij"), "abcdefgh…");
    }
}
