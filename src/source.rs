use std::collections::{BTreeMap, btree_map};

use tracing::info;

use crate::job::Job;
use crate::manifest::ManifestEntry;

/// Single-pass iterator over the jobs of a manifest, in manifest order.
///
/// Each source file is checked right before its job is yielded; files that
/// disappeared since the manifest was written are skipped and counted.
pub struct JobSource {
    entries: btree_map::IntoIter<String, ManifestEntry>,
    skipped: usize,
}

impl JobSource {
    pub(crate) fn new(entries: BTreeMap<String, ManifestEntry>) -> Self {
        Self {
            entries: entries.into_iter(),
            skipped: 0,
        }
    }

    /// Jobs dropped so far because their file was missing.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl Iterator for JobSource {
    type Item = Job;

    fn next(&mut self) -> Option<Job> {
        for (filename, entry) in self.entries.by_ref() {
            let job = Job::new(filename, entry.path, entry.new_name)
                .with_meta(entry.title, entry.author);
            if job.source_path().is_file() {
                return Some(job);
            }
            info!(file = %job.source_path().display(), "source file vanished, skipping");
            self.skipped += 1;
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.entries.len()))
    }
}
