use super::Session;
use crate::external::clang_format::Mode;
use anyhow::Result;
use clap::Args;

#[derive(Args)]
pub struct LintArgs {
    /// Files or glob patterns to check (`**` matches any depth); all candidates when omitted
    pub globs: Vec<String>,
}

pub async fn execute(args: LintArgs, session: &Session) -> Result<bool> {
    let Some(files) = session.select_by_globs(&args.globs)? else {
        return Ok(true);
    };

    let summary = session.run_tool(files, Mode::Lint).await?;
    Ok(session.report(&summary, Mode::Lint))
}
