use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_ADDR: &str = "127.0.0.1:8500";
const DEFAULT_SCHEME: &str = "http";

/// Connection settings for a Consul agent, read from a YAML file.
///
/// Keys may be written in snake case (`tag_filter`) or run together
/// (`tagfilter`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub addr: String,
    pub scheme: String,
    pub token: Option<String>,
    pub tls: TlsConfig,

    /// Overrides the default tag filter when set.
    #[serde(alias = "tagfilter")]
    pub tag_filter: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    #[serde(alias = "keyfile")]
    pub key_file: Option<PathBuf>,

    #[serde(alias = "certfile")]
    pub cert_file: Option<PathBuf>,

    #[serde(alias = "cafile")]
    pub ca_file: Option<PathBuf>,

    /// A directory of PEM-encoded CA certificates.
    #[serde(alias = "capath")]
    pub ca_path: Option<PathBuf>,

    #[serde(alias = "insecureskipverify")]
    pub insecure_skip_verify: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

// === impl Config ===

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&yaml).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document means "all defaults".
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }

    /// The agent's `host:port`, without any scheme prefix.
    pub fn addr(&self) -> &str {
        match self.addr.split_once("://") {
            Some((_, addr)) => addr,
            None if self.addr.is_empty() => DEFAULT_ADDR,
            None => &self.addr,
        }
    }

    /// A scheme prefixed to `addr` (e.g. `https://consul:8501`) overrides
    /// the `scheme` key.
    pub fn scheme(&self) -> &str {
        match self.addr.split_once("://") {
            Some((scheme, _)) => scheme,
            None if self.scheme.is_empty() => DEFAULT_SCHEME,
            None => &self.scheme,
        }
    }

    pub fn is_tls(&self) -> bool {
        self.scheme() == "https"
    }
}
