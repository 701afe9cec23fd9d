//! User configuration (`config.toml` in the platform config directory).

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use directories::ProjectDirs;
use serde::Deserialize;

use crate::error::CliError;

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Csv,
}

impl OutputFormat {
    /// Format implied by an output file name, if any.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "csv" => Some(OutputFormat::Csv),
            "md" | "markdown" => Some(OutputFormat::Markdown),
            _ => None,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(CliError::UnknownFormat(s.to_string())),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub format: Option<OutputFormat>,
    /// Cap on emitted rows.
    pub max_rows: Option<usize>,
    /// Log filter used when neither GENTABLE_LOG nor RUST_LOG is set.
    pub log: Option<String>,
}

pub(crate) fn default_config_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("me", "gentable", "gentable")?;
    let mut path = proj.config_dir().to_path_buf();
    path.push("config.toml");
    Some(path)
}

/// Load `explicit` (which must exist) or else the default config file if
/// present.
pub(crate) fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.is_file() => path,
            _ => return Ok(Config::default()),
        },
    };
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("reading config {}", path.display()))?;
    parse_config(&content).with_context(|| format!("parsing config {}", path.display()))
}

pub(crate) fn parse_config(content: &str) -> anyhow::Result<Config> {
    Ok(toml::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_path_is_deterministic() {
        assert_eq!(default_config_path(), default_config_path());
    }

    #[test]
    fn parse_full_config() {
        let config = parse_config("format = \"csv\"\nmax_rows = 5\nlog = \"debug\"\n").unwrap();
        assert_eq!(config.format, Some(OutputFormat::Csv));
        assert_eq!(config.max_rows, Some(5));
        assert_eq!(config.log.as_deref(), Some("debug"));
    }

    #[test]
    fn empty_config_is_default() {
        assert_eq!(parse_config("").unwrap(), Config::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse_config("colour = true").is_err());
        assert!(parse_config("format = \"xml\"").is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let missing = std::env::temp_dir().join(format!(
            "gentable_missing_config_{}.toml",
            std::process::id()
        ));
        assert!(load_config(Some(&missing)).is_err());
    }

    #[test]
    fn format_from_name_and_path() {
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert!("xml".parse::<OutputFormat>().is_err());
        assert_eq!(
            OutputFormat::from_path(Path::new("out.md")),
            Some(OutputFormat::Markdown)
        );
        assert_eq!(OutputFormat::from_path(Path::new("out")), None);
    }
}
