//! Subcommand implementations
//!
//! Every subcommand follows the same path: discover the repository, select the
//! candidate files, then hand them to the work scheduler with a clang-format job.

use crate::candidates::CandidateSet;
use crate::cli::Output;
use crate::config::FormatGuardConfig;
use crate::external::clang_format::{ClangFormat, ClangFormatJob, Mode};
use crate::git::GitRepo;
use crate::parallel::{RunSummary, StopSignal, WorkScheduler};
use crate::shared::glob::expand_file_patterns;
use anyhow::{Context, Result};
use std::path::PathBuf;

pub mod format;
pub mod lint;
pub mod lint_patch;

/// Everything a subcommand needs besides its own arguments
pub struct Session {
    pub config: FormatGuardConfig,
    /// `--clang-format`, overrides `clang_format.path`
    pub clang_format: Option<PathBuf>,
    pub output: Output,
}

impl Session {
    fn current_dir() -> Result<PathBuf> {
        let cwd = std::env::current_dir().context("Failed to read the current directory")?;
        // The repository root is canonical, so compare against a canonical base
        Ok(cwd.canonicalize().unwrap_or(cwd))
    }

    /// Candidate selection for the repository containing the working directory
    pub fn candidates(&self) -> Result<CandidateSet<GitRepo>> {
        let repo = GitRepo::discover(Self::current_dir()?)?;
        let root = repo.root().to_path_buf();
        tracing::debug!("Repository root: {}", root.display());

        Ok(CandidateSet::new(root, repo, self.config.candidates.clone()))
    }

    /// Files to check for `lint`/`format`; `None` when there is nothing to do.
    ///
    /// Without globs every candidate is selected. Globs that match no candidate
    /// select nothing rather than falling back to the whole repository.
    pub fn select_by_globs(&self, globs: &[String]) -> Result<Option<Vec<PathBuf>>> {
        let candidates = self.candidates()?;

        let files = if globs.is_empty() {
            candidates.select(None)?
        } else {
            let requested = expand_file_patterns(globs, Self::current_dir()?)?;
            self.output
                .verbose(&format!("{} path(s) matched {} pattern(s)", requested.len(), globs.len()));
            if requested.is_empty() {
                self.output.info("No files match the given patterns");
                return Ok(None);
            }
            candidates.select(Some(requested.as_slice()))?
        };

        Ok(self.non_empty(files))
    }

    fn non_empty(&self, files: Vec<PathBuf>) -> Option<Vec<PathBuf>> {
        if files.is_empty() {
            self.output.info("No candidate files to check");
            None
        } else {
            Some(files)
        }
    }

    /// Run clang-format over `files` on the worker pool, cancelling on Ctrl-C.
    pub async fn run_tool(&self, files: Vec<PathBuf>, mode: Mode) -> Result<RunSummary> {
        let tool = ClangFormat::from_config(&self.config.clang_format, self.clang_format.as_deref(), self.output)?;

        let parallel = &self.config.parallel;
        let cancel = StopSignal::new();
        let scheduler = WorkScheduler::from_config(parallel.max_threads, parallel.thread_percentage)
            .with_poll_interval(parallel.poll_interval())
            .with_cancellation(cancel.clone());

        let verb = match mode {
            Mode::Lint => "Checking",
            Mode::Format => "Formatting",
        };
        self.output.step(&format!(
            "{} {} file(s) with {} ({} worker(s))",
            verb,
            files.len(),
            tool.path().display(),
            scheduler.workers().min(files.len())
        ));
        self.output.verbose(&format!("Using --style={}", tool.style()));

        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, letting in-flight files finish");
                cancel.raise();
            }
        });

        let summary = tokio::task::spawn_blocking(move || {
            let job = ClangFormatJob::new(&tool, mode);
            scheduler.run_with_summary(files, &job)
        })
        .await
        .context("Worker pool terminated unexpectedly")?;

        interrupt.abort();
        Ok(summary)
    }

    /// Print the outcome of a run, `true` on full success
    pub fn report(&self, summary: &RunSummary, mode: Mode) -> bool {
        if summary.success() {
            match mode {
                Mode::Lint => self
                    .output
                    .success(&format!("{} file(s) match the code style", summary.total)),
                Mode::Format => self
                    .output
                    .success(&format!("{} file(s) are correctly formatted", summary.total)),
            }
            return true;
        }

        if summary.cancelled {
            self.output.warning(&format!(
                "Cancelled after {} of {} file(s)",
                summary.processed, summary.total
            ));
        }
        match mode {
            Mode::Lint => self.output.error("Code style does not match the clang-format style"),
            Mode::Format => self.output.error("Failed to format files"),
        }
        false
    }
}
