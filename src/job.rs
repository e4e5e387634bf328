use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The remote phases a job walks through, in order.
///
/// START → UPLOAD → PROCESS → DOWNLOAD → DONE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Start,
    Upload,
    Process,
    Download,
    Done,
}

impl Phase {
    /// The phase after this one. `Done` is terminal.
    pub fn next(self) -> Phase {
        match self {
            Phase::Start => Phase::Upload,
            Phase::Upload => Phase::Process,
            Phase::Process => Phase::Download,
            Phase::Download | Phase::Done => Phase::Done,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Start => write!(f, "START"),
            Phase::Upload => write!(f, "UPLOAD"),
            Phase::Process => write!(f, "PROCESS"),
            Phase::Download => write!(f, "DOWNLOAD"),
            Phase::Done => write!(f, "DONE"),
        }
    }
}

/// One file's trip through the compression service.
///
/// Identity is `(source_dir, filename)`; only `phase` changes once the job
/// has been produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub filename: String,
    pub source_dir: PathBuf,
    pub new_name: String,
    pub title: String,
    pub author: String,
    pub phase: Phase,
}

impl Job {
    pub fn new(
        filename: impl Into<String>,
        source_dir: impl Into<PathBuf>,
        new_name: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            source_dir: source_dir.into(),
            new_name: new_name.into(),
            title: String::new(),
            author: String::new(),
            phase: Phase::Start,
        }
    }

    pub fn with_meta(mut self, title: impl Into<String>, author: impl Into<String>) -> Self {
        self.title = title.into();
        self.author = author.into();
        self
    }

    pub fn source_path(&self) -> PathBuf {
        self.source_dir.join(&self.filename)
    }

    /// Moves the job to its next phase.
    pub fn advance(&mut self) {
        self.phase = self.phase.next();
    }
}
