//! clang-format integration
//!
//! Locates a clang-format binary, checks its version and runs it over single
//! files. Each check compares the file on disk with what the tool would write,
//! so a file is clean exactly when formatting it would be a no-op.

use crate::cli::Output;
use crate::config::ClangFormatConfig;
use crate::parallel::Worker;
use anyhow::{Context, Result, bail};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, PoisonError};

pub const PROGNAME: &str = "clang-format";

lazy_static! {
    // "clang-format version 3.6.0 (tags/RELEASE_360/final)",
    // "Ubuntu clang-format version 14.0.0-1ubuntu1.1"
    static ref VERSION_LINE: Regex = Regex::new(r"version\s+(\d+(?:\.\d+){1,2})").expect("version regex is valid");
}

/// Dotted version with as many components as were written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolVersion(Vec<u32>);

impl ToolVersion {
    /// Parse `major[.minor[.patch]]`
    pub fn parse(text: &str) -> Option<Self> {
        let parts = text
            .trim()
            .split('.')
            .map(|part| part.parse::<u32>().ok())
            .collect::<Option<Vec<_>>>()?;

        if parts.is_empty() || parts.len() > 3 {
            return None;
        }
        Some(Self(parts))
    }

    /// Extract the version from `clang-format --version` output
    pub fn from_version_output(output: &str) -> Option<Self> {
        let captures = VERSION_LINE.captures(output)?;
        Self::parse(captures.get(1)?.as_str())
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }

    /// Equal on every component `expected` names; `14.0.1` satisfies `14` and `14.0`.
    pub fn satisfies(&self, expected: &ToolVersion) -> bool {
        expected.0.len() <= self.0.len() && expected.0.iter().zip(&self.0).all(|(want, have)| want == have)
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text: Vec<String> = self.0.iter().map(u32::to_string).collect();
        f.write_str(&text.join("."))
    }
}

/// Run `<tool> --version` and parse the result
pub fn installed_version(tool: &Path) -> Result<ToolVersion> {
    let output = Command::new(tool)
        .arg("--version")
        .output()
        .with_context(|| format!("Failed to run {} --version", tool.display()))?;

    if !output.status.success() {
        bail!("{} --version exited with {}", tool.display(), output.status);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    ToolVersion::from_version_output(&stdout)
        .with_context(|| format!("Unrecognized version output from {}: {}", tool.display(), stdout.trim()))
}

/// Find the clang-format binary to use.
///
/// An explicit path wins and is only warned about when its version does not
/// match. Otherwise `clang-format-<major>.<minor>`, `clang-format-<major>` (when a
/// version is expected) and `clang-format` are looked up on `PATH`; binaries with
/// the wrong version are skipped.
pub fn locate(explicit: Option<&Path>, expected: Option<&ToolVersion>) -> Result<PathBuf> {
    if let Some(explicit) = explicit {
        let path = which::which(explicit)
            .with_context(|| format!("{} not found at {}", PROGNAME, explicit.display()))?;

        if let Some(expected) = expected {
            match installed_version(&path) {
                Ok(found) if found.satisfies(expected) => {}
                Ok(found) => tracing::warn!(
                    "{} is version {} but {} is expected, using it anyway",
                    path.display(),
                    found,
                    expected
                ),
                Err(err) => tracing::warn!("Could not verify the version of {}: {:#}", path.display(), err),
            }
        }

        tracing::debug!("Using {} {}", PROGNAME, path.display());
        return Ok(path);
    }

    for name in candidate_names(expected) {
        let Ok(path) = which::which(&name) else {
            tracing::debug!("{} is not on PATH", name);
            continue;
        };

        let Some(expected) = expected else {
            tracing::debug!("Using {} {}", PROGNAME, path.display());
            return Ok(path);
        };

        match installed_version(&path) {
            Ok(found) if found.satisfies(expected) => {
                tracing::debug!("Using {} {} ({})", PROGNAME, path.display(), found);
                return Ok(path);
            }
            Ok(found) => tracing::warn!(
                "Skipping {}: found version {}, expected {}",
                path.display(),
                found,
                expected
            ),
            Err(err) => tracing::warn!("Skipping {}: {:#}", path.display(), err),
        }
    }

    match expected {
        Some(expected) => bail!(
            "Could not find {} {} on PATH; install it or pass --clang-format <path>",
            PROGNAME,
            expected
        ),
        None => bail!("Could not find {} on PATH; install it or pass --clang-format <path>", PROGNAME),
    }
}

fn candidate_names(expected: Option<&ToolVersion>) -> Vec<String> {
    let mut names = Vec::new();
    if let Some(version) = expected {
        if let [major, minor, ..] = version.components() {
            names.push(format!("{PROGNAME}-{major}.{minor}"));
        }
        names.push(format!("{PROGNAME}-{}", version.components()[0]));
    }
    names.push(PROGNAME.to_string());
    names
}

/// A located clang-format binary plus the style it formats with
pub struct ClangFormat {
    path: PathBuf,
    style: String,
    // Keeps the multi-line reports of concurrent checks from interleaving
    print_lock: Mutex<()>,
    output: Output,
}

impl ClangFormat {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(path: P, style: S, output: Output) -> Self {
        Self {
            path: path.into(),
            style: style.into(),
            print_lock: Mutex::new(()),
            output,
        }
    }

    /// Locate the tool described by `config`; `explicit` overrides `config.path`.
    pub fn from_config(config: &ClangFormatConfig, explicit: Option<&Path>, output: Output) -> Result<Self> {
        let expected = config
            .version
            .as_deref()
            .map(|text| {
                ToolVersion::parse(text)
                    .with_context(|| format!("Invalid clang_format.version '{}', expected major[.minor[.patch]]", text))
            })
            .transpose()?;

        let path = locate(explicit.or(config.path.as_deref()), expected.as_ref())?;
        Ok(Self::new(path, config.style.as_str(), output))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn style(&self) -> &str {
        &self.style
    }

    /// `true` when `file` already has the expected format; reports the fix otherwise.
    pub fn lint(&self, file: &Path) -> Result<bool> {
        self.check(file, true)
    }

    /// Rewrite `file` in place unless it is already clean.
    pub fn format(&self, file: &Path) -> Result<bool> {
        if self.check(file, false)? {
            return Ok(true);
        }

        tracing::info!("Formatting {}", file.display());
        let status = Command::new(&self.path)
            .arg(self.style_arg())
            .arg("-i")
            .arg(file)
            .status()
            .with_context(|| format!("Failed to run {} on {}", self.path.display(), file.display()))?;

        if !status.success() {
            let _guard = self.print_lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.output
                .error(&format!("{} exited with {} while formatting {}", PROGNAME, status, file.display()));
        }
        Ok(status.success())
    }

    fn check(&self, file: &Path, report: bool) -> Result<bool> {
        let original = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;

        let formatted = Command::new(&self.path)
            .arg(self.style_arg())
            .arg(file)
            .output()
            .with_context(|| format!("Failed to run {} on {}", self.path.display(), file.display()))?;

        if !formatted.status.success() {
            bail!(
                "{} exited with {} for {}: {}",
                PROGNAME,
                formatted.status,
                file.display(),
                String::from_utf8_lossy(&formatted.stderr).trim()
            );
        }

        if formatted.stdout == original {
            tracing::debug!("{} is clean", file.display());
            return Ok(true);
        }

        if report {
            let _guard = self.print_lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.output.error(&format!("Found formatting diff for {}", file.display()));
            self.output.hint(&format!(
                "To fix formatting errors, run {} {} -i {}",
                self.path.display(),
                self.style_arg(),
                file.display()
            ));
        }
        Ok(false)
    }

    fn style_arg(&self) -> String {
        format!("--style={}", self.style)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Lint,
    Format,
}

/// Per-file callback handed to the work scheduler
pub struct ClangFormatJob<'a> {
    tool: &'a ClangFormat,
    mode: Mode,
}

impl<'a> ClangFormatJob<'a> {
    pub fn new(tool: &'a ClangFormat, mode: Mode) -> Self {
        Self { tool, mode }
    }
}

impl Worker<PathBuf> for ClangFormatJob<'_> {
    fn process(&self, file: &PathBuf) -> bool {
        let result = match self.mode {
            Mode::Lint => self.tool.lint(file),
            Mode::Format => self.tool.format(file),
        };

        match result {
            Ok(clean) => clean,
            Err(err) => {
                let _guard = self.tool.print_lock.lock().unwrap_or_else(PoisonError::into_inner);
                self.tool.output.error(&format!("{:#}", err));
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_from_tool_output() {
        let cases = [
            ("clang-format version 3.6.0 (tags/RELEASE_360/final)", Some(vec![3, 6, 0])),
            ("Ubuntu clang-format version 14.0.0-1ubuntu1.1", Some(vec![14, 0, 0])),
            ("clang-format version 17.0.6", Some(vec![17, 0, 6])),
            ("Homebrew clang-format version 18.1", Some(vec![18, 1])),
            ("no version here", None),
        ];

        for (output, expected) in cases {
            assert_eq!(ToolVersion::from_version_output(output).map(|v| v.0), expected, "{output}");
        }
    }

    #[test]
    fn test_version_parse_rejects_garbage() {
        assert!(ToolVersion::parse("14").is_some());
        assert!(ToolVersion::parse("14.x").is_none());
        assert!(ToolVersion::parse("").is_none());
        assert!(ToolVersion::parse("1.2.3.4").is_none());
    }

    #[test]
    fn test_version_matches_named_components_only() {
        let found = ToolVersion::parse("3.6.0").unwrap();
        for ok in ["3", "3.6", "3.6.0"] {
            assert!(found.satisfies(&ToolVersion::parse(ok).unwrap()), "{ok}");
        }
        for bad in ["4", "3.7", "3.6.1"] {
            assert!(!found.satisfies(&ToolVersion::parse(bad).unwrap()), "{bad}");
        }
        assert!(!ToolVersion::parse("3.6").unwrap().satisfies(&found));
        assert_eq!(found.to_string(), "3.6.0");
    }

    #[test]
    fn test_candidate_names_prefer_versioned_binaries() {
        let version = ToolVersion::parse("14.0").unwrap();
        assert_eq!(
            candidate_names(Some(&version)),
            vec!["clang-format-14.0", "clang-format-14", "clang-format"]
        );
        assert_eq!(candidate_names(None), vec!["clang-format"]);
    }

    #[cfg(unix)]
    mod with_fake_tool {
        use super::super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::sync::OnceLock;
        use tempfile::TempDir;

        // Strips trailing whitespace, like a very small clang-format
        const FAKE_TOOL: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
  echo "clang-format version 3.6.0 (tags/RELEASE_360/final)"
  exit 0
fi
shift
if [ "$1" = "-i" ]; then
  sed 's/[[:space:]]*$//' "$2" > "$2.tmp" && mv "$2.tmp" "$2"
  exit 0
fi
sed 's/[[:space:]]*$//' "$1"
"#;

        const BROKEN_TOOL: &str = "#!/bin/sh\necho 'cannot parse input' >&2\nexit 3\n";

        // Written once, before any test spawns a process, so no child inherits a
        // still-open script handle.
        fn tools() -> &'static TempDir {
            static TOOLS: OnceLock<TempDir> = OnceLock::new();
            TOOLS.get_or_init(|| {
                let dir = TempDir::new().unwrap();
                for (name, body) in [("clang-format", FAKE_TOOL), ("broken-format", BROKEN_TOOL)] {
                    let path = dir.path().join(name);
                    std::fs::write(&path, body).unwrap();
                    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
                }
                dir
            })
        }

        fn fake() -> PathBuf {
            tools().path().join("clang-format")
        }

        fn tool() -> ClangFormat {
            ClangFormat::new(fake(), "file", Output::new(false, true))
        }

        #[test]
        fn test_lint_clean_and_dirty_files() -> Result<()> {
            let dir = TempDir::new()?;
            let clean = dir.path().join("clean.cpp");
            let dirty = dir.path().join("dirty.cpp");
            std::fs::write(&clean, "int main() {\n  return 0;\n}\n")?;
            std::fs::write(&dirty, "int main() {   \n  return 0;\n}\n")?;

            let tool = tool();
            assert!(tool.lint(&clean)?);
            assert!(!tool.lint(&dirty)?);
            Ok(())
        }

        #[test]
        fn test_format_repairs_file_in_place() -> Result<()> {
            let dir = TempDir::new()?;
            let dirty = dir.path().join("dirty.h");
            std::fs::write(&dirty, "#pragma once  \nint f();\t\n")?;

            let tool = tool();
            assert!(tool.format(&dirty)?);
            assert_eq!(std::fs::read_to_string(&dirty)?, "#pragma once\nint f();\n");
            assert!(tool.lint(&dirty)?);
            Ok(())
        }

        #[test]
        fn test_tool_failure_is_an_error_and_a_failed_item() -> Result<()> {
            let dir = TempDir::new()?;
            let file = dir.path().join("a.cpp");
            std::fs::write(&file, "int x;\n")?;

            let broken = ClangFormat::new(tools().path().join("broken-format"), "file", Output::new(false, true));
            let err = broken.lint(&file).unwrap_err();
            assert!(format!("{err:#}").contains("cannot parse input"));

            assert!(!ClangFormatJob::new(&broken, Mode::Lint).process(&file));
            assert!(ClangFormatJob::new(&tool(), Mode::Format).process(&file));
            Ok(())
        }

        #[test]
        fn test_missing_file_fails_the_item() {
            let tool = tool();
            let job = ClangFormatJob::new(&tool, Mode::Lint);
            assert!(!job.process(&PathBuf::from("/definitely/not/here.cpp")));
        }

        #[test]
        fn test_installed_version() -> Result<()> {
            assert_eq!(installed_version(&fake())?, ToolVersion::parse("3.6.0").unwrap());
            Ok(())
        }

        #[test]
        fn test_explicit_tool_is_used_even_on_version_mismatch() -> Result<()> {
            let expected = ToolVersion::parse("14").unwrap();
            assert_eq!(locate(Some(fake().as_path()), Some(&expected))?, fake());
            assert_eq!(locate(Some(fake().as_path()), None)?, fake());
            Ok(())
        }

        #[test]
        fn test_explicit_tool_must_exist() {
            let missing = tools().path().join("nope");
            assert!(locate(Some(missing.as_path()), None).is_err());
        }

        #[test]
        fn test_from_config_rejects_bad_version() {
            let config = ClangFormatConfig {
                path: Some(fake()),
                version: Some("fourteen".to_string()),
                style: "file".to_string(),
            };
            assert!(ClangFormat::from_config(&config, None, Output::default()).is_err());
        }

        #[test]
        fn test_from_config_flag_overrides_config_path() -> Result<()> {
            let config = ClangFormatConfig {
                path: Some(tools().path().join("nope")),
                version: None,
                style: "Google".to_string(),
            };
            let tool = ClangFormat::from_config(&config, Some(fake().as_path()), Output::default())?;
            assert_eq!(tool.path(), fake());
            assert_eq!(tool.style(), "Google");
            Ok(())
        }
    }
}
