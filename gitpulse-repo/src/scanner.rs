//! Code volume scanner
//!
//! Walks a workspace and counts non-blank lines of every countable file.

use gitpulse_core::{CodeVolume, PulseError, ScanConfig};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::filter::FileFilter;

/// Counts non-blank lines under a directory tree
#[derive(Debug, Clone, Default)]
pub struct CodeScanner {
    filter: FileFilter,
}

impl CodeScanner {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            filter: FileFilter::new(config),
        }
    }

    /// Scan `root` recursively.
    ///
    /// Unreadable entries are skipped. Files without a single non-blank line
    /// are left out of `per_file`, so `total_lines` is always its sum.
    pub fn scan<P: AsRef<Path>>(&self, root: P) -> CodeVolume {
        let root = root.as_ref();
        let mut volume = CodeVolume::default();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
                !entry.file_type().is_dir() || self.filter.should_traverse_directory(relative)
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let relative = match entry.path().strip_prefix(root) {
                Ok(relative) => relative,
                Err(_) => continue,
            };

            if !self.filter.should_include_file(relative) {
                continue;
            }

            match count_non_blank_lines(entry.path()) {
                Ok(lines) => volume.record(to_slash_path(relative), lines),
                Err(e) => e.log(),
            }
        }

        info!(
            root = %root.display(),
            files = volume.file_count,
            lines = volume.total_lines,
            "Counted lines of code"
        );

        volume
    }
}

/// Count lines whose trimmed content is non-empty. Invalid UTF-8 is replaced
/// rather than rejected. Reads one line at a time.
pub fn count_non_blank_lines(path: &Path) -> Result<u64, PulseError> {
    let file = File::open(path).map_err(|e| read_failure(path, e))?;
    let mut reader = BufReader::new(file);
    let mut line = Vec::new();
    let mut count = 0;

    loop {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .map_err(|e| read_failure(path, e))?;
        if read == 0 {
            break;
        }
        if !String::from_utf8_lossy(&line).trim().is_empty() {
            count += 1;
        }
    }

    Ok(count)
}

fn read_failure(path: &Path, source: std::io::Error) -> PulseError {
    PulseError::Scan {
        message: format!("failed to read {}", path.display()),
        path: path.display().to_string(),
        source: Some(source),
    }
}

fn to_slash_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
