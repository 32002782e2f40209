//! # formatguard
//!
//! Parallel clang-format lint and repair for the tracked C and C++ sources of a
//! git repository.
//!
//! The pieces, leaves first:
//!
//! - [`shared::glob`]: glob expansion with `**` (any number of directories)
//! - [`candidates`]: tracked files filtered by extension and excluded directories,
//!   optionally intersected with an explicit path list
//! - [`parallel`]: a bounded worker pool that stops dispatching after the first failure
//! - [`external::clang_format`]: the per-file check and repair
//!
//! ## Quick Start
//!
//! ```bash
//! # Check every candidate file
//! formatguard lint
//!
//! # Check only the files a patch touches
//! formatguard lint-patch my-change.patch
//!
//! # Rewrite the headers under src/
//! formatguard format 'src/**/*.h'
//! ```

pub mod candidates;
pub mod cli;
pub mod config;
pub mod external;
pub mod git;
pub mod parallel;
pub mod shared;

pub use cli::{Cli, Output};
pub use config::FormatGuardConfig;

/// Result type alias for formatguard operations
pub type Result<T> = anyhow::Result<T>;
