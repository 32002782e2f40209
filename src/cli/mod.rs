//! Command-line interface for formatguard

use crate::config::FormatGuardConfig;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;
mod output;

pub use commands::Session;
pub use output::Output;

#[derive(Parser)]
#[command(
    name = "formatguard",
    version = env!("CARGO_PKG_VERSION"),
    about = "Check and repair clang-format style across a git repository",
    long_about = "formatguard runs clang-format over the tracked C and C++ sources of a git \
                  repository in parallel. Files can be selected with glob patterns (`**` \
                  matches any number of directories) or by the patches that touch them.",
    propagate_version = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Run as if started in <DIR> instead of current working directory
    #[arg(short = 'C', long = "directory", global = true)]
    pub directory: Option<PathBuf>,

    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use custom configuration file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// clang-format binary to use instead of searching PATH
    #[arg(
        short = 'c',
        long = "clang-format",
        env = "FORMATGUARD_CLANG_FORMAT",
        global = true,
        value_name = "PATH"
    )]
    pub clang_format: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check that files match the clang-format style
    Lint(commands::lint::LintArgs),
    /// Check the files touched by one or more patches
    LintPatch(commands::lint_patch::LintPatchArgs),
    /// Rewrite files that do not match the clang-format style
    Format(commands::format::FormatArgs),
}

impl Cli {
    /// `Ok(false)` when any file failed or the run was interrupted
    pub async fn run(self) -> Result<bool> {
        // Change directory if specified
        if let Some(dir) = &self.directory {
            std::env::set_current_dir(dir)
                .with_context(|| format!("Failed to change directory to {}", dir.display()))?;
        }

        // Set up logging based on verbosity
        setup_logging(self.verbose, self.quiet);

        let session = Session {
            config: FormatGuardConfig::load(self.config.as_deref())?,
            clang_format: self.clang_format,
            output: Output::new(self.verbose > 0, self.quiet),
        };

        match self.command {
            Commands::Lint(args) => commands::lint::execute(args, &session).await,
            Commands::LintPatch(args) => commands::lint_patch::execute(args, &session).await,
            Commands::Format(args) => commands::format::execute(args, &session).await,
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => tracing_subscriber::EnvFilter::new("warn"),
        1 => tracing_subscriber::EnvFilter::new("info"),
        2 => tracing_subscriber::EnvFilter::new("debug"),
        _ => tracing_subscriber::EnvFilter::new("trace"),
    });

    // Keep stdout for the per-file report
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
