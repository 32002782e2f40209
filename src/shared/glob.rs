//! Glob pattern expansion
//!
//! Expands shell-style patterns into filesystem paths. Every segment supports the
//! ordinary wildcards (`*`, `?`, `[...]`); a segment that is exactly `**` matches zero
//! or more directory levels. Expansion is lazy: [`Pattern::matches`] hands back an
//! iterator that reads directories only as it is advanced, and calling it again
//! starts a fresh pass over the filesystem. A trailing separator (`src/*/`,
//! `a/**/`) restricts the final matches to directories.
//!
//! Directory walks never descend through symbolic links, so a link pointing back
//! at one of its parents cannot make an expansion infinite.

use super::paths::{absolutize, normalize};
use glob::MatchOptions;
use std::collections::HashSet;
use std::path::{Component, MAIN_SEPARATOR, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use walkdir::WalkDir;

/// The recursive wildcard segment.
pub const GLOBSTAR: &str = "**";

/// Shell semantics: wildcards never cross a separator and never match a leading dot.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Errors raised while compiling a pattern, before any filesystem access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("`**` must be a whole path segment (a/**/b), found `{segment}`")]
    GlobstarMixed { segment: String },
    #[error("invalid glob segment `{segment}`: {reason}")]
    Syntax { segment: String, reason: String },
}

/// Check if a string contains glob pattern characters
pub fn is_glob_pattern(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?') || pattern.contains('[')
}

/// A validated glob pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    segments: Arc<[String]>,
    absolute: bool,
    dirs_only: bool,
}

impl Pattern {
    /// Split and canonicalize `pattern`.
    ///
    /// Runs of consecutive `**` segments collapse into one. A segment that mixes
    /// `**` with anything else (`b**`, `**x`, `***`) is rejected, as is any
    /// segment the shell-glob compiler refuses.
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        let segments = canonicalize(split_segments(pattern))?;

        Ok(Self {
            source: pattern.to_string(),
            segments: segments.into(),
            absolute: Path::new(pattern).is_absolute(),
            dirs_only: pattern.ends_with('/') || pattern.ends_with(MAIN_SEPARATOR),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Canonical segments; the filesystem root, when present, is the first one.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether the pattern ended in a separator and only matches directories.
    pub fn dirs_only(&self) -> bool {
        self.dirs_only
    }

    pub fn has_globstar(&self) -> bool {
        self.segments.iter().any(|s| s == GLOBSTAR)
    }

    /// Expand against the current working directory.
    pub fn matches(&self) -> Matches {
        self.matches_in(Path::new("."))
    }

    /// Expand with relative patterns resolved against `dir`.
    ///
    /// Yielded paths stay relative to `dir` for relative patterns, exactly as if
    /// `dir` were the working directory; absolute patterns ignore `dir`.
    pub fn matches_in<P: AsRef<Path>>(&self, dir: P) -> Matches {
        let base = (!self.absolute).then(|| dir.as_ref().to_path_buf());
        let dedup = self.segments.iter().filter(|s| *s == GLOBSTAR).count() > 1
            || self.segments.iter().any(|s| s == "..");

        let mut matches = Matches {
            base,
            dirs_only: self.dirs_only,
            stack: Vec::new(),
            seen: dedup.then(HashSet::new),
        };
        if let Some(frame) = matches.plan(None, &self.segments) {
            matches.stack.push(frame);
        }
        matches
    }
}

/// Compile and expand `pattern` against the current working directory.
pub fn iglob(pattern: &str) -> Result<Matches, PatternError> {
    Ok(Pattern::new(pattern)?.matches())
}

/// Expand a list of file patterns into absolute, normalized paths.
///
/// Relative patterns are resolved against `base_dir`. Every pattern is compiled
/// before anything is expanded, so one malformed pattern fails the whole call.
/// Overlapping patterns may produce the same path more than once.
pub fn expand_file_patterns<P: AsRef<Path>>(
    patterns: &[String],
    base_dir: P,
) -> Result<Vec<PathBuf>, PatternError> {
    let base_dir = base_dir.as_ref();
    let compiled = patterns
        .iter()
        .map(|p| Pattern::new(p))
        .collect::<Result<Vec<_>, _>>()?;

    let mut paths = Vec::new();
    for pattern in &compiled {
        let before = paths.len();
        paths.extend(
            pattern
                .matches_in(base_dir)
                .map(|path| absolutize(path, base_dir)),
        );
        tracing::debug!(
            "Pattern '{}' expanded to {} path(s)",
            pattern.as_str(),
            paths.len() - before
        );
    }

    Ok(paths)
}

fn split_segments(pattern: &str) -> Vec<String> {
    let segments: Vec<String> = Path::new(pattern)
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    // `.` and `./` name the current directory itself
    if segments.is_empty() && Path::new(pattern).components().next().is_some() {
        return vec![".".to_string()];
    }
    segments
}

fn canonicalize(parts: Vec<String>) -> Result<Vec<String>, PatternError> {
    let mut segments = Vec::with_capacity(parts.len());
    let mut prev_was_globstar = false;

    for part in parts {
        if part == GLOBSTAR {
            if !prev_was_globstar {
                segments.push(part);
            }
            prev_was_globstar = true;
        } else if part.contains(GLOBSTAR) {
            return Err(PatternError::GlobstarMixed { segment: part });
        } else {
            if let Err(e) = glob::Pattern::new(&part) {
                return Err(PatternError::Syntax {
                    segment: part,
                    reason: e.msg.to_string(),
                });
            }
            prev_was_globstar = false;
            segments.push(part);
        }
    }

    Ok(segments)
}

/// One pending source of candidate paths.
enum Frame {
    /// Ordinary shell-glob expansion. With `then`, every matched directory is
    /// expanded further by those segments instead of being yielded.
    Glob {
        paths: glob::Paths,
        then: Option<Arc<[String]>>,
    },
    /// Recursive listing below a directory for a `**` segment. With `then`, every
    /// directory reached is expanded by the segments following the `**`.
    Walk {
        entries: walkdir::IntoIter,
        then: Option<Arc<[String]>>,
        dirs_only: bool,
    },
}

enum Step {
    Exhausted,
    Skip,
    Yield(PathBuf),
    Descend(PathBuf, Arc<[String]>),
}

/// Lazy sequence of normalized paths matching a [`Pattern`].
pub struct Matches {
    /// Directory relative patterns are resolved against; `None` for absolute patterns.
    base: Option<PathBuf>,
    dirs_only: bool,
    stack: Vec<Frame>,
    seen: Option<HashSet<PathBuf>>,
}

impl Matches {
    /// Build the frame expanding `segments` below `dir` (a path in yielded form).
    fn plan(&self, dir: Option<&Path>, segments: &[String]) -> Option<Frame> {
        if segments.is_empty() {
            return None;
        }

        let Some(index) = segments.iter().position(|s| s == GLOBSTAR) else {
            return self.glob(dir, segments, None);
        };

        let prefix = &segments[..index];
        if prefix.iter().any(|s| is_glob_pattern(s)) {
            // a*/**/b: expand the wildcard prefix first, then walk each directory it names
            return self.glob(dir, prefix, Some(segments[index..].into()));
        }

        let mut start = dir.map(Path::to_path_buf).unwrap_or_default();
        for segment in prefix {
            start.push(segment);
        }
        let suffix = &segments[index + 1..];
        let then = (!suffix.is_empty()).then(|| suffix.into());

        let entries = WalkDir::new(self.on_disk(&start))
            .follow_links(false)
            .sort_by(|a, b| {
                // Files before subdirectories, so a directory's own children come out
                // before the walk descends any further.
                a.file_type()
                    .is_dir()
                    .cmp(&b.file_type().is_dir())
                    .then_with(|| a.file_name().cmp(b.file_name()))
            })
            .into_iter();

        let dirs_only = self.dirs_only && then.is_none();
        Some(Frame::Walk { entries, then, dirs_only })
    }

    fn glob(
        &self,
        dir: Option<&Path>,
        segments: &[String],
        then: Option<Arc<[String]>>,
    ) -> Option<Frame> {
        let mut pattern = match (&self.base, dir) {
            (None, None) => String::new(),
            (_, dir) => {
                let anchor = self.on_disk(dir.unwrap_or(Path::new("")));
                glob::Pattern::escape(&anchor.to_string_lossy())
            }
        };
        for segment in segments {
            if !pattern.is_empty() && !pattern.ends_with(MAIN_SEPARATOR) {
                pattern.push(MAIN_SEPARATOR);
            }
            pattern.push_str(segment);
        }
        if self.dirs_only && then.is_none() && !pattern.ends_with(MAIN_SEPARATOR) {
            pattern.push(MAIN_SEPARATOR);
        }

        match glob::glob_with(&pattern, MATCH_OPTIONS) {
            Ok(paths) => Some(Frame::Glob { paths, then }),
            Err(e) => {
                tracing::warn!("Skipping unexpandable pattern '{}': {}", pattern, e);
                None
            }
        }
    }

    fn on_disk(&self, path: &Path) -> PathBuf {
        match &self.base {
            Some(base) if path.as_os_str().is_empty() => base.clone(),
            Some(base) => base.join(path),
            None => path.to_path_buf(),
        }
    }

    fn shown(&self, path: &Path) -> PathBuf {
        match &self.base {
            Some(base) => path.strip_prefix(base).unwrap_or(path).to_path_buf(),
            None => path.to_path_buf(),
        }
    }

    fn advance(frame: &mut Frame) -> Step {
        match frame {
            Frame::Glob { paths, then } => match paths.next() {
                None => Step::Exhausted,
                Some(Err(e)) => {
                    tracing::debug!("Unreadable path during expansion: {}", e);
                    Step::Skip
                }
                Some(Ok(path)) => match then {
                    None => Step::Yield(path),
                    Some(rest) if is_real_dir(&path) => Step::Descend(path, rest.clone()),
                    Some(_) => Step::Skip,
                },
            },
            Frame::Walk {
                entries,
                then,
                dirs_only,
            } => match entries.next() {
                None => Step::Exhausted,
                Some(Err(e)) => {
                    // A missing start directory lands here too: it simply matches nothing.
                    tracing::debug!("Skipping during recursive expansion: {}", e);
                    Step::Skip
                }
                Some(Ok(entry)) => {
                    let top = entry.depth() == 0;
                    let is_dir = entry.file_type().is_dir() && (top || !entry.path_is_symlink());
                    if top && !is_dir {
                        return Step::Skip;
                    }
                    match then {
                        None if *dirs_only && !is_dir => Step::Skip,
                        None => Step::Yield(entry.into_path()),
                        Some(suffix) if is_dir => Step::Descend(entry.into_path(), suffix.clone()),
                        Some(_) => Step::Skip,
                    }
                }
            },
        }
    }
}

impl Iterator for Matches {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            let step = Self::advance(self.stack.last_mut()?);

            match step {
                Step::Exhausted => {
                    self.stack.pop();
                }
                Step::Skip => {}
                Step::Yield(path) => {
                    let path = normalize(self.shown(&path));
                    if let Some(seen) = &mut self.seen {
                        if !seen.insert(path.clone()) {
                            continue;
                        }
                    }
                    return Some(path);
                }
                Step::Descend(dir, segments) => {
                    let dir = self.shown(&dir);
                    if let Some(frame) = self.plan(Some(&dir), &segments) {
                        self.stack.push(frame);
                    }
                }
            }
        }
    }
}

fn is_real_dir(path: &Path) -> bool {
    std::fs::symlink_metadata(path)
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}
