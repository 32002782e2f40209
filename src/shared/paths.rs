//! Textual path normalization
//!
//! Paths produced by glob expansion, patch headers and the git index are compared
//! as plain values, so they all go through [`normalize`] first. Nothing here touches
//! the filesystem or resolves symlinks.

use std::path::{Component, Path, PathBuf};

/// Normalize a path lexically.
///
/// Drops `.` components, folds `name/..` pairs, removes trailing separators and
/// repeated separators. A `..` that would climb above the root of an absolute path
/// is discarded; leading `..` components of a relative path are kept. An empty
/// result becomes `.`.
pub fn normalize<P: AsRef<Path>>(path: P) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();

    for component in path.as_ref().components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return PathBuf::from(".");
    }

    parts.iter().collect()
}

/// Join `path` onto `base` unless it is already absolute, then normalize.
pub fn absolutize<P: AsRef<Path>, B: AsRef<Path>>(path: P, base: B) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(base.as_ref().join(path))
    }
}
