//! Optional YAML configuration for the `edi` binary

use anyhow::Context;
use clap::ValueEnum;
use edi_engine::DocumentFormat;
use serde::Deserialize;
use std::path::Path;

/// Input format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatChoice {
    /// XML when the first non-whitespace byte is `<`, flat file otherwise
    #[default]
    Auto,
    Flat,
    Xml,
}

impl FormatChoice {
    /// Resolve the concrete format for an input
    pub fn resolve(self, input: &[u8]) -> DocumentFormat {
        match self {
            Self::Flat => DocumentFormat::FlatFile,
            Self::Xml => DocumentFormat::Xml,
            Self::Auto => {
                let first = input.iter().find(|b| !b.is_ascii_whitespace());
                if first == Some(&b'<') {
                    DocumentFormat::Xml
                } else {
                    DocumentFormat::FlatFile
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default tracing filter; `RUST_LOG` takes precedence
    pub log_level: Option<String>,
    pub default_format: FormatChoice,
    /// Pretty-print JSON reports
    pub pretty: bool,
}

impl Config {
    /// Load a config file, or the defaults when no path is given
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn log_filter(&self) -> &str {
        self.log_level.as_deref().unwrap_or("warn")
    }
}
