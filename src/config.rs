//! Settings and on-disk layout.
//!
//! [`Settings`] is read from `settings.toml` under the application root;
//! missing fields fall back to defaults. [`AppPaths`] fixes where sources,
//! outputs, the manifest, the key file and the log live.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::PressError;

const APP_DIR: &str = "pdfsqueeze";
const SOURCE_DIR: &str = "pdfs";
const OUTPUT_DIR: &str = "compress_pdfs";
const KEY_FILE: &str = "config.json";
const MANIFEST_FILE: &str = "manifest.json";
const SETTINGS_FILE: &str = "settings.toml";
const LOG_FILE: &str = "pdfsqueeze.log";

/// Tunables loaded from `settings.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Number of concurrent workers.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacity of the hand-off queue between the producer and the workers.
    /// Defaults to the worker count.
    #[serde(default)]
    pub queue_capacity: Option<usize>,

    #[serde(default = "default_tool")]
    pub tool: String,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Scheme used to reach the task servers handed out by `start`.
    #[serde(default = "default_server_scheme")]
    pub server_scheme: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Upper bound on any single remote call, body transfer included.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Stop handing out jobs as soon as one job fails.
    #[serde(default)]
    pub fail_fast: bool,
}

fn default_workers() -> usize {
    3
}

fn default_tool() -> String {
    "compress".to_string()
}

fn default_region() -> String {
    "us".to_string()
}

fn default_api_base_url() -> String {
    "https://api.ilovepdf.com/v1".to_string()
}

fn default_server_scheme() -> String {
    "https".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: None,
            tool: default_tool(),
            region: default_region(),
            api_base_url: default_api_base_url(),
            server_scheme: default_server_scheme(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            fail_fast: false,
        }
    }
}

impl Settings {
    /// Loads settings from `path`, or defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self, PressError> {
        let settings = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<Settings>(&contents)?
        } else {
            Self::default()
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), PressError> {
        if self.workers == 0 {
            return Err(PressError::Config("workers must be at least 1".into()));
        }
        if self.queue_capacity == Some(0) {
            return Err(PressError::Config("queue_capacity must be at least 1".into()));
        }
        Ok(())
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity.unwrap_or(self.workers)
    }
}

/// Directory layout under the application root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub root: PathBuf,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub key_file: PathBuf,
    pub manifest_file: PathBuf,
    pub settings_file: PathBuf,
    pub log_file: PathBuf,
}

impl AppPaths {
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let source_dir = root.join(SOURCE_DIR);
        Self {
            output_dir: root.join(OUTPUT_DIR),
            key_file: root.join(KEY_FILE),
            manifest_file: source_dir.join(MANIFEST_FILE),
            settings_file: root.join(SETTINGS_FILE),
            log_file: root.join(LOG_FILE),
            source_dir,
            root,
        }
    }

    /// Uses `root` when given, otherwise `~/pdfsqueeze`.
    pub fn resolve(root: Option<PathBuf>) -> Result<Self, PressError> {
        match root {
            Some(root) => Ok(Self::under(root)),
            None => {
                let home = dirs::home_dir().ok_or_else(|| {
                    PressError::Config("could not determine the home directory".into())
                })?;
                Ok(Self::under(home.join(APP_DIR)))
            }
        }
    }

    /// Creates the source and output areas if they are missing.
    pub fn ensure_dirs(&self) -> Result<(), PressError> {
        std::fs::create_dir_all(&self.source_dir)?;
        std::fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }
}
