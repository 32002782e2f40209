//! Git integration layer
//!
//! Opens the repository a run is scoped to and exposes what the candidate filter
//! needs from it: the work-tree root and the list of tracked files.

pub mod operations;
pub mod patch;

use anyhow::{Context, Result};
use git2::Repository;
use std::path::{Path, PathBuf};

/// A repository with a working tree.
pub struct GitRepo {
    repo: Repository,
    root: PathBuf,
}

impl GitRepo {
    /// Open the repository whose work tree is exactly `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let repo = Repository::open(path)
            .with_context(|| format!("Failed to open Git repository at {}", path.display()))?;

        Self::from_repository(repo)
    }

    /// Discover the repository containing `start`, walking up parent directories
    pub fn discover<P: AsRef<Path>>(start: P) -> Result<Self> {
        let start = start.as_ref();
        let repo = Repository::discover(start)
            .with_context(|| format!("No Git repository found from {}", start.display()))?;

        Self::from_repository(repo)
    }

    fn from_repository(repo: Repository) -> Result<Self> {
        let workdir = repo
            .workdir()
            .context("Repository has no working directory")?;
        let root = workdir
            .canonicalize()
            .with_context(|| format!("Failed to resolve work tree {}", workdir.display()))?;

        tracing::debug!("Using repository rooted at {}", root.display());
        Ok(Self { repo, root })
    }

    /// Absolute, symlink-resolved root of the working tree
    pub fn root(&self) -> &Path {
        &self.root
    }
}
