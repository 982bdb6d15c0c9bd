//! Configuration file for nodescope
//!
//! Optional TOML file passed with `--config`. Every field is optional and
//! command-line flags take precedence over it.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nodescope_k8s::{DEFAULT_DASHBOARD_BASE_URL, DEFAULT_METRICS_TIMEOUT, DerivationPolicy};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Explicit kubeconfig path (defaults to KUBECONFIG, then ~/.kube/config)
    pub kubeconfig: Option<PathBuf>,

    /// Seconds to wait for node metrics before reporting zero usage
    pub metrics_timeout_secs: Option<u64>,

    /// What to do with nodes whose provider metadata is malformed
    pub derivation_policy: DerivationPolicy,

    /// Prefix of the dashboard link; the instance id is appended
    pub dashboard_base_url: Option<String>,
}

impl Config {
    /// Load config from a file, or return defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn metrics_timeout(&self) -> Duration {
        self.metrics_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_METRICS_TIMEOUT)
    }

    pub fn dashboard_base_url(&self) -> &str {
        self.dashboard_base_url
            .as_deref()
            .unwrap_or(DEFAULT_DASHBOARD_BASE_URL)
    }
}
