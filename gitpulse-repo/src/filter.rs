//! File classification for code volume counting

use gitpulse_core::ScanConfig;
use std::collections::HashSet;
use std::path::{Component, Path};

/// Decides which paths count as source for line counting
#[derive(Debug, Clone)]
pub struct FileFilter {
    excluded_dirs: HashSet<String>,
    extensions: HashSet<String>,
    filenames: HashSet<String>,
}

impl Default for FileFilter {
    fn default() -> Self {
        Self::new(&ScanConfig::default())
    }
}

impl FileFilter {
    pub fn new(config: &ScanConfig) -> Self {
        let lower = |items: &[String]| {
            items
                .iter()
                .map(|s| s.trim_start_matches('.').to_lowercase())
                .collect::<HashSet<_>>()
        };

        Self {
            excluded_dirs: config.excluded_dirs.iter().cloned().collect(),
            extensions: lower(&config.included_extensions),
            filenames: config
                .included_filenames
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
        }
    }

    /// Whether a directory (relative to the scan root) should be walked
    pub fn should_traverse_directory<P: AsRef<Path>>(&self, relative: P) -> bool {
        !self.is_excluded(relative.as_ref())
    }

    /// Whether a file (relative to the scan root) counts as source
    pub fn should_include_file<P: AsRef<Path>>(&self, relative: P) -> bool {
        let path = relative.as_ref();
        if self.is_excluded(path) {
            return false;
        }

        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_lowercase(),
            None => return false,
        };

        if self.filenames.contains(&name) {
            return true;
        }

        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }

    fn is_excluded(&self, path: &Path) -> bool {
        path.components().any(|component| match component {
            Component::Normal(part) => part
                .to_str()
                .map(|part| self.excluded_dirs.contains(part))
                .unwrap_or(false),
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn includes_allow_listed_extensions_case_insensitively() {
        let filter = FileFilter::default();
        assert!(filter.should_include_file("src/main.py"));
        assert!(filter.should_include_file("src/App.TSX"));
        assert!(filter.should_include_file("docs/README.md"));
        assert!(!filter.should_include_file("assets/logo.png"));
        assert!(!filter.should_include_file("Cargo.lock"));
    }

    #[test]
    fn includes_build_script_names() {
        let filter = FileFilter::default();
        assert!(filter.should_include_file("Makefile"));
        assert!(filter.should_include_file("docker/Dockerfile"));
        assert!(filter.should_include_file("api.dockerfile"));
    }

    #[test]
    fn excludes_by_whole_path_component() {
        let filter = FileFilter::default();
        assert!(!filter.should_include_file("node_modules/left-pad/index.js"));
        assert!(!filter.should_include_file("pkg/__pycache__/mod.py"));
        assert!(!filter.should_include_file(".git/hooks/pre-commit.sh"));
        assert!(!filter.should_traverse_directory("web/dist"));
        // Only exact component matches are excluded
        assert!(filter.should_include_file("src/builder.rs"));
        assert!(filter.should_include_file("distribution/setup.py"));
    }
}
