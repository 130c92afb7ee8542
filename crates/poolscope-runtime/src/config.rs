use crate::{Error, Result};
use poolscope_providers::{DEFAULT_LARGE_DOCUMENT_WARN_BYTES, DEFAULT_MAX_ENTRY_LINES, MatcherDefinition};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "POOLSCOPE_CONFIG";

/// Resolve the config file path based on priority:
/// 1. Explicit path (with tilde expansion)
/// 2. POOLSCOPE_CONFIG environment variable (with tilde expansion)
/// 3. `<config dir>/poolscope/config.toml`
///
/// Returns `None` when no candidate can be formed at all.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    resolve_from(
        explicit_path,
        std::env::var(CONFIG_ENV).ok(),
        dirs::config_dir(),
    )
}

fn resolve_from(
    explicit_path: Option<&Path>,
    env_path: Option<String>,
    config_dir: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(expand_tilde(&path.to_string_lossy()));
    }

    if let Some(env_path) = env_path.filter(|p| !p.trim().is_empty()) {
        return Some(expand_tilde(&env_path));
    }

    config_dir.map(|dir| dir.join("poolscope").join("config.toml"))
}

/// Expand tilde (~) in paths to the user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    PathBuf::from(path)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShredConfig {
    /// gzip level of the part files (0-9)
    pub compression_level: u32,
    pub large_document_warn_bytes: u64,
}

impl Default for ShredConfig {
    fn default() -> Self {
        Self {
            compression_level: 6,
            large_document_warn_bytes: DEFAULT_LARGE_DOCUMENT_WARN_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TraceConfig {
    /// Only files whose name starts with this are aggregated
    pub file_prefix: String,
    /// Year for `MM-DD` stamps when the file path carries no date
    pub default_year: Option<i32>,
    pub lossy_utf8: bool,
    pub max_entry_lines: usize,
    /// Extra matchers, tried before the built-in ones
    pub matchers: Vec<MatcherDefinition>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            file_prefix: "geth".to_string(),
            default_year: None,
            lossy_utf8: false,
            max_entry_lines: DEFAULT_MAX_ENTRY_LINES,
            matchers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Input files processed in parallel
    pub jobs: usize,
    pub shred: ShredConfig,
    pub trace: TraceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jobs: 1,
            shred: ShredConfig::default(),
            trace: TraceConfig::default(),
        }
    }
}

impl Config {
    /// Load from the resolved location; a missing default file yields defaults,
    /// a missing explicitly named file is an error.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let Some(path) = resolve_config_path(explicit_path) else {
            return Ok(Self::default());
        };
        if explicit_path.is_some() && !path.exists() {
            return Err(Error::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.jobs == 0 {
            return Err(Error::Config("jobs must be at least 1".to_string()));
        }
        if self.shred.compression_level > 9 {
            return Err(Error::Config(format!(
                "shred.compression_level must be 0-9, got {}",
                self.shred.compression_level
            )));
        }
        if self.trace.max_entry_lines == 0 {
            return Err(Error::Config(
                "trace.max_entry_lines must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.jobs, 1);
        assert_eq!(config.shred.compression_level, 6);
        assert_eq!(config.shred.large_document_warn_bytes, 52_428_800);
        assert_eq!(config.trace.file_prefix, "geth");
        assert!(config.trace.matchers.is_empty());
    }

    #[test]
    fn test_full_config_parses() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
jobs = 4

[shred]
compression_level = 9

[trace]
file_prefix = "node"
default_year = 2025

[[trace.matchers]]
name = "blob-rejected"
pattern = "Rejecting blob transaction"
category = "invalidation"
metric = "blob_rejected"
"#,
        )?;

        let config = Config::load_from(&path)?;
        assert_eq!(config.jobs, 4);
        assert_eq!(config.shred.compression_level, 9);
        assert_eq!(
            config.shred.large_document_warn_bytes,
            DEFAULT_LARGE_DOCUMENT_WARN_BYTES
        );
        assert_eq!(config.trace.file_prefix, "node");
        assert_eq!(config.trace.default_year, Some(2025));
        assert_eq!(config.trace.matchers[0].name, "blob-rejected");
        assert_eq!(config.trace.matchers[0].count, None);
        Ok(())
    }

    #[test]
    fn test_invalid_values_are_rejected() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.toml");

        std::fs::write(&path, "jobs = 0\n")?;
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));

        std::fs::write(&path, "[shred]\ncompresion_level = 3\n")?;
        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("compresion_level"));
        Ok(())
    }

    #[test]
    fn test_load_nonexistent_returns_default() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = Config::load_from(&temp_dir.path().join("nonexistent.toml"))?;
        assert_eq!(config, Config::default());
        Ok(())
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/poolscope.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn test_resolution_priority() {
        let dir = Some(PathBuf::from("/cfg"));

        assert_eq!(
            resolve_from(Some(Path::new("/x.toml")), Some("/env.toml".into()), dir.clone()),
            Some(PathBuf::from("/x.toml"))
        );
        assert_eq!(
            resolve_from(None, Some("/env.toml".into()), dir.clone()),
            Some(PathBuf::from("/env.toml"))
        );
        assert_eq!(
            resolve_from(None, Some("  ".into()), dir.clone()),
            Some(PathBuf::from("/cfg/poolscope/config.toml"))
        );
        assert_eq!(resolve_from(None, None, None), None);
    }
}
