use std::fmt;
use std::path::Path;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Serialize, de::DeserializeOwned};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

impl OutputFormat {
    pub fn render<T: Serialize>(self, value: &T) -> anyhow::Result<String> {
        Ok(match self {
            OutputFormat::Yaml => serde_yaml::to_string(value)?,
            OutputFormat::Json => {
                let mut text = serde_json::to_string_pretty(value)?;
                text.push('\n');
                text
            }
        })
    }

    pub fn print<T: Serialize>(self, value: &T) -> anyhow::Result<()> {
        print!("{}", self.render(value)?);
        Ok(())
    }
}

/// A command-line value holding a YAML (or JSON) document.
#[derive(Clone)]
pub struct Yaml<T>(pub T);

impl<T: DeserializeOwned> FromStr for Yaml<T> {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_yaml::from_str(s)
            .map(Yaml)
            .map_err(|e| format!("invalid YAML value: {e}"))
    }
}

impl<T> fmt::Debug for Yaml<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Yaml<{}>", std::any::type_name::<T>())
    }
}

impl<T> Yaml<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Reads a whole payload from a YAML or JSON file, or starts from an empty one.
pub fn load_payload<T: DeserializeOwned + Default>(file: Option<&Path>) -> anyhow::Result<T> {
    let Some(path) = file else {
        return Ok(T::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
    serde_yaml::from_str(&text)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {e}", path.display()))
}

/// Parses `key=value`, as used by label filters.
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{s}'")),
    }
}
