use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::params::{ParamId, PatchSettings};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Startup configuration: the initial patch and the controller bindings.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub patch: PatchSettings,
    pub buttons: ButtonMap,
}

impl Config {
    pub fn from_toml(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Binding {
    pub controller: u8,
    pub param: ParamId,
}

/// Which controller number drives which parameter.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ButtonMap(Vec<Binding>);

impl ButtonMap {
    pub fn new(bindings: Vec<Binding>) -> Self {
        Self(bindings)
    }

    /// The last binding for a controller wins.
    pub fn lookup(&self, controller: u8) -> Option<ParamId> {
        self.0
            .iter()
            .rev()
            .find(|b| b.controller == controller)
            .map(|b| b.param)
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.0
    }
}
