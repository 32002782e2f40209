//! Patch file parsing
//!
//! Pulls the list of touched files out of patches produced by `git diff` or
//! `git format-patch`, so a check can be limited to what a change modifies.

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};

lazy_static! {
    /// `diff --git a/<path> b/<path>`; the pre-image path is the one reported
    static ref DIFF_HEADER: Regex =
        Regex::new(r"^diff --git a/(\S+) b/\S+").expect("diff header regex is valid");
}

/// Paths named by `diff --git` headers in `content`, relative to the repository root
pub fn files_in_patch(content: &str) -> Vec<PathBuf> {
    content
        .lines()
        .filter_map(|line| DIFF_HEADER.captures(line))
        .filter_map(|caps| caps.get(1))
        .map(|m| PathBuf::from(m.as_str()))
        .collect()
}

/// Read every patch file and collect the paths they touch, in order of appearance
pub fn files_from_patches<P: AsRef<Path>>(patches: &[P]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for patch in patches {
        let patch = patch.as_ref();
        let bytes = std::fs::read(patch)
            .with_context(|| format!("Failed to read patch file: {}", patch.display()))?;
        let found = files_in_patch(&String::from_utf8_lossy(&bytes));

        tracing::debug!("Patch {} touches {} file(s)", patch.display(), found.len());
        files.extend(found);
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const PATCH: &str = "\
From 1b2c3d Mon Sep 17 00:00:00 2001
Subject: [PATCH] tidy

diff --git a/src/mongo/db/query.cpp b/src/mongo/db/query.cpp
index 111..222 100644
--- a/src/mongo/db/query.cpp
+++ b/src/mongo/db/query.cpp
@@ -1,3 +1,3 @@
-diff --git a/not/a/header.cpp b/not/a/header.cpp
+int x;
diff --git a/src/mongo/Base_Util.h b/src/mongo/Base_Util.h
new file mode 100644
";

    #[test]
    fn test_files_in_patch_reads_diff_headers() {
        let files = files_in_patch(PATCH);
        assert_eq!(
            files,
            vec![
                PathBuf::from("src/mongo/db/query.cpp"),
                PathBuf::from("src/mongo/Base_Util.h"),
            ]
        );
    }

    #[test]
    fn test_files_in_patch_ignores_plain_text() {
        assert!(files_in_patch("no headers here\n--- a/x\n+++ b/x\n").is_empty());
    }

    #[test]
    fn test_files_from_patches_concatenates_in_order() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let first = temp_dir.path().join("first.patch");
        let second = temp_dir.path().join("second.patch");
        fs::write(&first, "diff --git a/src/a.cpp b/src/a.cpp\n")?;
        fs::write(&second, "diff --git a/src/b.h b/src/b.h\n")?;

        let files = files_from_patches(&[&first, &second])?;
        assert_eq!(files, vec![PathBuf::from("src/a.cpp"), PathBuf::from("src/b.h")]);
        Ok(())
    }

    #[test]
    fn test_missing_patch_file_is_an_error() {
        let result = files_from_patches(&["/definitely/not/here.patch"]);
        assert!(result.is_err());
    }
}
