use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::modules::charset::Encoding;

pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Serialization a reader session decodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    #[default]
    Binary,
    Xml,
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::Binary => write!(f, "binary"),
            SourceFormat::Xml => write!(f, "xml"),
        }
    }
}

impl FromStr for SourceFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "binary" | "iso2709" | "marc" => Ok(SourceFormat::Binary),
            "xml" | "marcxml" => Ok(SourceFormat::Xml),
            other => Err(format!("Unknown source format: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderConfig {
    pub queue_capacity: usize,
    /// Overrides leader position 9 for binary sources
    pub encoding_override: Option<Encoding>,
    pub format: SourceFormat,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            encoding_override: None,
            format: SourceFormat::Binary,
        }
    }
}

impl ReaderConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup. Unparseable values fall back to
    /// the defaults with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let queue_capacity = lookup("MARC_QUEUE_CAPACITY")
            .and_then(|v| match v.trim().parse::<usize>() {
                Ok(n) if n >= 1 => Some(n),
                _ => {
                    tracing::warn!("Ignoring invalid MARC_QUEUE_CAPACITY '{}'", v);
                    None
                }
            })
            .unwrap_or(defaults.queue_capacity);

        let encoding_override = lookup("MARC_SOURCE_ENCODING").and_then(|v| {
            v.parse::<Encoding>()
                .map_err(|e| tracing::warn!("Ignoring MARC_SOURCE_ENCODING: {}", e))
                .ok()
        });

        let format = lookup("MARC_SOURCE_FORMAT")
            .and_then(|v| {
                v.parse::<SourceFormat>()
                    .map_err(|e| tracing::warn!("Ignoring MARC_SOURCE_FORMAT: {}", e))
                    .ok()
            })
            .unwrap_or(defaults.format);

        Self {
            queue_capacity,
            encoding_override,
            format,
        }
    }
}
