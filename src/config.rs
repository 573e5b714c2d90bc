// ABOUTME: Configuration structures and parsing for the known_hosts location and delint behaviour
// ABOUTME: Loaded from an optional TOML file; command-line flags override individual values

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Config {
    pub known_hosts: KnownHostsConfig,
    #[serde(default)]
    pub delint: DelintConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct KnownHostsConfig {
    pub path: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct DelintConfig {
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub transitive: bool,
    #[serde(default)]
    pub non_entry_lines: NonEntryLines,
}

/// Where the normalized result goes.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Print a unified diff and exit 1 if the file would change
    Diff,
    /// Replace the input file in place
    Apply,
    /// Write the result to stdout
    #[default]
    Emit,
}

/// What happens to blank, comment, directive and malformed lines.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NonEntryLines {
    /// Kept verbatim, ahead of the merged entries, in their original order
    #[default]
    Preserve,
    Drop,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            known_hosts: KnownHostsConfig {
                path: "~/.ssh/known_hosts".to_string(),
            },
            delint: DelintConfig::default(),
        }
    }
}

impl Config {
    pub fn default_config_content() -> &'static str {
        r#"# known-hosts-delint configuration

[known_hosts]
# File to normalize when no path is given on the command line
path = "~/.ssh/known_hosts"

[delint]
# emit: print to stdout, diff: show a unified diff, apply: rewrite the file
mode = "emit"
# Union host sets across keys that share any host
transitive = false
# Blank, comment (#) and marker (@) lines: "preserve" or "drop"
non_entry_lines = "preserve"
"#
    }

    pub fn load_from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse configuration")
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
        Self::load_from_str(&content)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to determine config directory")?;
        Ok(config_dir.join("known-hosts-delint").join("config.toml"))
    }

    /// Loads `explicit` if given, otherwise the default config file when one
    /// exists, otherwise the built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }

        match Self::default_config_path() {
            Ok(path) if path.exists() => {
                tracing::debug!("Loading configuration from {}", path.display());
                Self::load_from_file(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn expand_path(&mut self) -> Result<()> {
        self.known_hosts.path = expand_tilde(&self.known_hosts.path)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.known_hosts.path.trim().is_empty() {
            anyhow::bail!("known_hosts path cannot be empty");
        }

        Ok(())
    }
}

pub fn expand_tilde(path: &str) -> Result<String> {
    if path == "~" || path.starts_with("~/") {
        let home = dirs::home_dir().context("Failed to determine home directory")?;
        let expanded = match path.strip_prefix("~/") {
            Some(rest) => home.join(rest),
            None => home,
        };
        Ok(expanded.to_string_lossy().into_owned())
    } else {
        Ok(path.to_string())
    }
}
