use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::terminal::{AnsiColor, Palette};

/// Script host configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Length of a guest time slice before the scheduler yields to the event loop (default: 100)
    pub yield_limit_ms: u64,

    /// Color of regular output
    pub normal_color: AnsiColor,

    /// Seed for `choice`/`random.*`; entropy when absent
    pub seed: Option<u64>,

    /// Directory of `.py` files exposed as importable library modules
    pub library_dir: Option<PathBuf>,

    /// Whether the host echoes typed characters itself
    pub echo_input: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            yield_limit_ms: 100,
            normal_color: AnsiColor::Green,
            seed: None,
            library_dir: None,
            echo_input: true,
        }
    }
}

impl HostConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Time-slice length.
    pub fn yield_limit(&self) -> Duration {
        Duration::from_millis(self.yield_limit_ms)
    }

    /// Palette built from `normal_color`.
    pub fn palette(&self) -> Palette {
        Palette::new(self.normal_color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_files_fill_in_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"seed": 7, "normal_color": "cyan"}}"#).unwrap();
        let config = HostConfig::load(file.path()).unwrap();
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.normal_color, AnsiColor::Cyan);
        assert_eq!(config.yield_limit(), Duration::from_millis(100));
        assert!(config.echo_input);
    }

    #[test]
    fn bad_files_report_the_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = HostConfig::load(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("failed to parse config"));

        let missing = HostConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(missing.to_string().contains("failed to read config"));
    }
}
