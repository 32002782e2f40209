use super::GitRepo;
use crate::candidates::FileInventory;
use anyhow::{Context, Result};
use std::path::PathBuf;

impl GitRepo {
    /// Files recorded in the index, relative to the work-tree root.
    ///
    /// This is the `git ls-files` view: staged additions are included, untracked
    /// files are not. Conflicted paths appear once.
    pub fn tracked_files(&self) -> Result<Vec<PathBuf>> {
        let index = self.repo.index().context("Failed to read the Git index")?;

        let mut files: Vec<PathBuf> = index
            .iter()
            .map(|entry| PathBuf::from(String::from_utf8_lossy(&entry.path).into_owned()))
            .collect();
        files.dedup();

        tracing::debug!("Index lists {} tracked file(s)", files.len());
        Ok(files)
    }
}

impl FileInventory for GitRepo {
    fn tracked_files(&self) -> Result<Vec<PathBuf>> {
        GitRepo::tracked_files(self)
    }
}
