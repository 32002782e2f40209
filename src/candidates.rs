//! Candidate file selection
//!
//! A candidate is a tracked file whose extension is on the allow-list and whose
//! path does not run through an excluded directory (bundled third-party code,
//! examples). Callers may narrow the set further with an explicit list of paths,
//! e.g. the expansion of command-line globs or the files named in a patch.

use crate::shared::paths::normalize;
use anyhow::Result;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// Source of the repository's tracked files.
pub trait FileInventory {
    /// Tracked files relative to the repository root, in a stable order.
    fn tracked_files(&self) -> Result<Vec<PathBuf>>;
}

impl FileInventory for Vec<PathBuf> {
    fn tracked_files(&self) -> Result<Vec<PathBuf>> {
        Ok(self.clone())
    }
}

/// Which tracked files are worth checking
#[derive(Debug, Clone, Deserialize)]
pub struct CandidateFilter {
    /// Extensions without the leading dot
    pub extensions: Vec<String>,
    /// Directory names that exclude every path running through them
    pub exclude: Vec<String>,
    /// When non-empty, a path must run through at least one of these directories
    #[serde(default)]
    pub require: Vec<String>,
}

impl Default for CandidateFilter {
    fn default() -> Self {
        Self {
            extensions: vec!["h".to_string(), "hpp".to_string(), "cpp".to_string()],
            exclude: vec!["examples".to_string(), "third_party".to_string()],
            require: vec![],
        }
    }
}

impl CandidateFilter {
    pub fn accepts(&self, path: &Path) -> bool {
        let has_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|allowed| allowed == ext));
        if !has_extension {
            return false;
        }

        let dirs = path
            .parent()
            .into_iter()
            .flat_map(Path::components)
            .filter_map(|c| match c {
                Component::Normal(name) => name.to_str(),
                _ => None,
            });

        let mut required_seen = self.require.is_empty();
        for dir in dirs {
            if self.exclude.iter().any(|excluded| excluded == dir) {
                return false;
            }
            if !required_seen && self.require.iter().any(|required| required == dir) {
                required_seen = true;
            }
        }

        required_seen
    }
}

/// Repository-scoped candidate selection
pub struct CandidateSet<I> {
    root: PathBuf,
    inventory: I,
    filter: CandidateFilter,
}

impl<I: FileInventory> CandidateSet<I> {
    /// `root` must be the absolute work-tree root the inventory's paths are relative to
    pub fn new<P: Into<PathBuf>>(root: P, inventory: I, filter: CandidateFilter) -> Self {
        Self {
            root: root.into(),
            inventory,
            filter,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Tracked files that pass the filter, relative to the root
    pub fn candidate_files(&self) -> Result<Vec<PathBuf>> {
        let files: Vec<PathBuf> = self
            .inventory
            .tracked_files()?
            .into_iter()
            .map(normalize)
            .filter(|path| self.filter.accepts(path))
            .collect();

        tracing::debug!("{} candidate file(s) after filtering", files.len());
        Ok(files)
    }

    /// Intersect `requested` with the candidate files and return absolute paths.
    ///
    /// Absolute entries of `requested` are made relative to the root first; entries
    /// outside the root can never match. With no requested paths (`None` or empty)
    /// every candidate is returned. The result follows inventory order and holds
    /// each file once.
    pub fn select(&self, requested: Option<&[PathBuf]>) -> Result<Vec<PathBuf>> {
        let candidates = self.candidate_files()?;

        let selected = match requested {
            Some(requested) if !requested.is_empty() => {
                let wanted: HashSet<PathBuf> = requested
                    .iter()
                    .filter_map(|path| self.relative_to_root(path))
                    .collect();
                candidates
                    .into_iter()
                    .filter(|path| wanted.contains(path))
                    .collect()
            }
            _ => candidates,
        };

        Ok(selected
            .into_iter()
            .map(|path| normalize(self.root.join(path)))
            .collect())
    }

    fn relative_to_root(&self, path: &Path) -> Option<PathBuf> {
        if !path.is_absolute() {
            return Some(normalize(path));
        }

        match normalize(path).strip_prefix(&self.root) {
            Ok(relative) => Some(normalize(relative)),
            Err(_) => {
                tracing::debug!("Ignoring {} outside {}", path.display(), self.root.display());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory(paths: &[&str]) -> Vec<PathBuf> {
        paths.iter().map(PathBuf::from).collect()
    }

    fn set(paths: &[&str]) -> CandidateSet<Vec<PathBuf>> {
        CandidateSet::new("/repo", inventory(paths), CandidateFilter::default())
    }

    fn abs(paths: &[&str]) -> Vec<PathBuf> {
        paths.iter().map(|p| Path::new("/repo").join(p)).collect()
    }

    #[test]
    fn test_filter_checks_extension_allow_list() {
        let filter = CandidateFilter::default();
        assert!(filter.accepts(Path::new("src/a.cpp")));
        assert!(filter.accepts(Path::new("src/a.h")));
        assert!(filter.accepts(Path::new("src/a.hpp")));
        assert!(!filter.accepts(Path::new("src/a.c")));
        assert!(!filter.accepts(Path::new("src/a.cpp.orig")));
        assert!(!filter.accepts(Path::new("SConstruct")));
    }

    #[test]
    fn test_filter_excludes_directory_segments_only() {
        let filter = CandidateFilter::default();
        assert!(!filter.accepts(Path::new("src/third_party/zlib/zlib.h")));
        assert!(!filter.accepts(Path::new("docs/examples/demo.cpp")));
        assert!(filter.accepts(Path::new("src/examples_util.cpp")));
        assert!(filter.accepts(Path::new("src/my_third_party_shim.h")));
    }

    #[test]
    fn test_filter_require_segments() {
        let filter = CandidateFilter {
            require: vec!["src".to_string()],
            ..CandidateFilter::default()
        };
        assert!(filter.accepts(Path::new("src/mongo/a.cpp")));
        assert!(!filter.accepts(Path::new("tools/a.cpp")));
        assert!(!filter.accepts(Path::new("src.cpp")));
    }

    #[test]
    fn test_select_without_request_returns_filtered_inventory() -> Result<()> {
        let set = set(&["src/a.cpp", "README.md", "src/third_party/b.h", "src/c.hpp"]);

        assert_eq!(set.select(None)?, abs(&["src/a.cpp", "src/c.hpp"]));
        assert_eq!(set.select(Some(&[][..]))?, abs(&["src/a.cpp", "src/c.hpp"]));
        Ok(())
    }

    #[test]
    fn test_select_intersects_relative_and_absolute_requests() -> Result<()> {
        let set = set(&["src/a.cpp", "src/b.h", "src/c.hpp"]);
        let requested = vec![
            PathBuf::from("/repo/src/c.hpp"),
            PathBuf::from("./src/a.cpp"),
            PathBuf::from("/elsewhere/src/b.h"),
            PathBuf::from("src/missing.cpp"),
        ];

        assert_eq!(set.select(Some(requested.as_slice()))?, abs(&["src/a.cpp", "src/c.hpp"]));
        Ok(())
    }

    #[test]
    fn test_select_drops_requested_files_failing_the_filter() -> Result<()> {
        let set = set(&["src/a.cpp", "src/notes.txt", "src/third_party/x.cpp"]);
        let requested = vec![
            PathBuf::from("src/notes.txt"),
            PathBuf::from("/repo/src/third_party/x.cpp"),
        ];

        assert!(set.select(Some(requested.as_slice()))?.is_empty());
        Ok(())
    }

    #[test]
    fn test_select_returns_each_file_once() -> Result<()> {
        let set = set(&["src/a.cpp"]);
        let requested = vec![PathBuf::from("src/a.cpp"), PathBuf::from("/repo/src/a.cpp")];

        assert_eq!(set.select(Some(requested.as_slice()))?, abs(&["src/a.cpp"]));
        Ok(())
    }
}
