//! Configuration for formatguard
//!
//! Values are layered with figment, lowest priority first:
//! embedded defaults, the user config, the repository config (or only the file
//! passed with `--config`) and finally `FORMATGUARD_*` environment variables.

use crate::candidates::CandidateFilter;
use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Env, Format, Json, Toml, Yaml};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

const ENV_PREFIX: &str = "FORMATGUARD_";
const CONFIG_EXTENSIONS: [&str; 4] = ["toml", "yaml", "yml", "json"];

#[derive(Debug, Clone, Deserialize)]
pub struct FormatGuardConfig {
    pub clang_format: ClangFormatConfig,
    pub candidates: CandidateFilter,
    pub parallel: ParallelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClangFormatConfig {
    /// Explicit tool path; the `--clang-format` flag takes precedence
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Expected `major[.minor[.patch]]`
    #[serde(default)]
    pub version: Option<String>,
    /// Passed as `--style=<style>`
    pub style: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParallelConfig {
    /// Upper bound on worker threads, 0 for no bound
    pub max_threads: usize,
    /// Share of the available processing units to use
    pub thread_percentage: u8,
    pub poll_interval_ms: u64,
}

impl ParallelConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl FormatGuardConfig {
    pub fn load(custom_config: Option<&Path>) -> Result<Self> {
        Self::figment(custom_config)?
            .extract()
            .context("Failed to load configuration")
    }

    /// The merged provider stack, exposed for callers that want a single value
    pub fn figment(custom_config: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::new().merge(Toml::string(DEFAULT_CONFIG));

        // A custom config replaces the user and repository files
        if let Some(custom_path) = custom_config {
            if !custom_path.is_file() {
                bail!("Configuration file not found: {}", custom_path.display());
            }
            tracing::debug!("Loading configuration from {}", custom_path.display());
            figment = merge_file(figment, custom_path);
        } else {
            if let Some(user_dir) = Self::user_config_dir() {
                for ext in CONFIG_EXTENSIONS {
                    figment = merge_file(figment, &user_dir.join(format!("config.{ext}")));
                }
            }
            for ext in CONFIG_EXTENSIONS {
                figment = merge_file(figment, Path::new(&format!("formatguard.{ext}")));
            }
        }

        // FORMATGUARD_CLANG_FORMAT belongs to the --clang-format flag
        figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["clang_format"]).split("__"));

        Ok(figment)
    }

    fn user_config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config").join("formatguard"))
    }
}

/// Pick the provider from the file extension; TOML when unknown.
/// Missing files contribute nothing.
fn merge_file(figment: Figment, path: &Path) -> Figment {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "json" => figment.merge(Json::file(path)),
        "yaml" | "yml" => figment.merge(Yaml::file(path)),
        _ => figment.merge(Toml::file(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_load() -> Result<()> {
        let config = FormatGuardConfig::load(None)?;

        assert_eq!(config.clang_format.style, "file");
        assert!(config.clang_format.version.is_none());
        assert_eq!(config.candidates.extensions, vec!["h", "hpp", "cpp"]);
        assert_eq!(config.candidates.exclude, vec!["examples", "third_party"]);
        assert!(config.candidates.require.is_empty());
        assert_eq!(config.parallel.max_threads, 0);
        Ok(())
    }

    #[test]
    fn test_custom_toml_overrides_defaults() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[clang_format]\nversion = \"14.0\"\n\n[candidates]\nrequire = [\"src\"]\n\n[parallel]\nmax_threads = 3\n",
        )?;

        let config = FormatGuardConfig::load(Some(&path))?;
        assert_eq!(config.clang_format.version.as_deref(), Some("14.0"));
        assert_eq!(config.clang_format.style, "file");
        assert_eq!(config.candidates.require, vec!["src"]);
        assert_eq!(config.candidates.extensions, vec!["h", "hpp", "cpp"]);
        assert_eq!(config.parallel.max_threads, 3);
        Ok(())
    }

    #[test]
    fn test_custom_yaml_and_json() -> Result<()> {
        let dir = TempDir::new()?;
        let yaml = dir.path().join("custom.yml");
        std::fs::write(&yaml, "clang_format:\n  style: Google\ncandidates:\n  extensions: [cc, h]\n")?;
        let json = dir.path().join("custom.json");
        std::fs::write(&json, r#"{"parallel": {"max_threads": 2}}"#)?;

        let config = FormatGuardConfig::load(Some(&yaml))?;
        assert_eq!(config.clang_format.style, "Google");
        assert_eq!(config.candidates.extensions, vec!["cc", "h"]);

        let config = FormatGuardConfig::load(Some(&json))?;
        assert_eq!(config.parallel.max_threads, 2);
        Ok(())
    }

    #[test]
    fn test_missing_custom_config_is_an_error() {
        let result = FormatGuardConfig::load(Some(Path::new("does/not/exist.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_value_is_an_error() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[parallel]\nmax_threads = \"many\"\n")?;

        assert!(FormatGuardConfig::load(Some(&path)).is_err());
        Ok(())
    }

    #[test]
    fn test_environment_overrides_nested_keys() -> Result<()> {
        unsafe {
            std::env::set_var("FORMATGUARD_PARALLEL__THREAD_PERCENTAGE", "50");
            std::env::set_var("FORMATGUARD_CLANG_FORMAT", "/opt/llvm/bin/clang-format");
        }

        let config = FormatGuardConfig::load(None)?;
        assert_eq!(config.parallel.thread_percentage, 50);
        assert!(config.clang_format.path.is_none());
        Ok(())
    }

    #[test]
    fn test_poll_interval_is_never_zero() {
        let parallel = ParallelConfig {
            max_threads: 0,
            thread_percentage: 100,
            poll_interval_ms: 0,
        };
        assert_eq!(parallel.poll_interval(), Duration::from_millis(1));
    }
}
