//! Lint only the files a patch touches
//!
//! Paths come from the `diff --git a/<path> b/<path>` headers and are relative to
//! the repository root. Files the patch touches that are not candidates (wrong
//! extension, excluded directory, untracked) are skipped silently.

use super::Session;
use crate::external::clang_format::Mode;
use crate::git::patch::files_from_patches;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct LintPatchArgs {
    /// Patch files in `git diff` format
    #[arg(required = true)]
    pub patches: Vec<PathBuf>,
}

pub async fn execute(args: LintPatchArgs, session: &Session) -> Result<bool> {
    let touched = files_from_patches(&args.patches)?;
    if touched.is_empty() {
        session.output.info("The patch touches no files");
        return Ok(true);
    }

    let candidates = session.candidates()?;
    let files = candidates.select(Some(touched.as_slice()))?;
    if files.is_empty() {
        session.output.info("The patch touches no candidate files");
        return Ok(true);
    }

    tracing::info!("{} of {} patched file(s) are candidates", files.len(), touched.len());
    let summary = session.run_tool(files, Mode::Lint).await?;
    Ok(session.report(&summary, Mode::Lint))
}
