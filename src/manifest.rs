//! The manifest: the pending jobs of one batch, keyed by filename.
//!
//! Built by `init` from the PDFs sitting in the source area, consumed once by
//! `compress`, then deleted.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PressError;
use crate::slug;
use crate::source::JobSource;

/// Title value meaning "use each file's own name as its title".
pub const TITLE_FROM_FILENAME: &str = "filename";

const PDF_EXTENSION: &str = "pdf";

/// What `compress` needs to know about one pending file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Directory holding the source file.
    pub path: PathBuf,
    pub new_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    /// Reads the manifest at `path`; a missing file is
    /// [`PressError::ManifestNotFound`].
    pub fn load(path: &Path) -> Result<Self, PressError> {
        if !path.exists() {
            return Err(PressError::ManifestNotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), PressError> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Deletes the manifest file. A file that is already gone is fine.
    pub fn remove(path: &Path) -> Result<(), PressError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Lists the PDFs directly inside `source_dir` and describes each one.
    ///
    /// `title` equal to [`TITLE_FROM_FILENAME`] gives each file its own stem
    /// as title. Output names are slugs of the filename; clashing slugs get a
    /// `-2`, `-3`, ... suffix in filename order.
    pub fn build(source_dir: &Path, title: &str, author: &str) -> Result<Self, PressError> {
        let mut filenames = Vec::new();
        for entry in std::fs::read_dir(source_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_pdf(&name) {
                filenames.push(name);
            }
        }
        filenames.sort();

        let mut taken = HashSet::new();
        let mut entries = BTreeMap::new();
        for filename in filenames {
            let new_name = unique_name(slug::output_filename(&filename), &mut taken);
            let title = if title == TITLE_FROM_FILENAME {
                file_stem(&filename).to_string()
            } else {
                title.to_string()
            };
            debug!(%filename, %new_name, "queued");
            entries.insert(
                filename,
                ManifestEntry {
                    path: source_dir.to_path_buf(),
                    new_name,
                    title,
                    author: author.to_string(),
                },
            );
        }

        Ok(Self { entries })
    }

    pub fn insert(&mut self, filename: impl Into<String>, entry: ManifestEntry) {
        self.entries.insert(filename.into(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &ManifestEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Consumes the manifest into a single-pass job source.
    pub fn into_source(self) -> JobSource {
        JobSource::new(self.entries)
    }
}

fn is_pdf(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(PDF_EXTENSION))
}

fn file_stem(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    }
}

fn unique_name(candidate: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(candidate.clone()) {
        return candidate;
    }
    let (stem, ext) = match candidate.rsplit_once('.') {
        Some((stem, ext)) => (stem.to_string(), format!(".{ext}")),
        None => (candidate.clone(), String::new()),
    };
    let mut n = 2;
    loop {
        let name = format!("{stem}-{n}{ext}");
        if taken.insert(name.clone()) {
            return name;
        }
        n += 1;
    }
}
