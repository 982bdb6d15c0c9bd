use std::path::{Path, PathBuf};

use kube::config::{KubeconfigError, Kubeconfig};

use crate::error::ConfigError;
use nodescope_types::ContextName;

/// Source of the active cluster context
pub trait ContextResolver: Send + Sync {
    /// Resolve the context that requests should currently target
    fn current_context(&self) -> Result<ContextName, ConfigError>;
}

/// Resolves the current context by re-reading the kubeconfig on every call,
/// so a context switched by `kubectl config use-context` is picked up.
#[derive(Clone, Debug, Default)]
pub struct KubeconfigResolver {
    path: Option<PathBuf>,
}

impl KubeconfigResolver {
    /// Use an explicit kubeconfig path, or the kube defaults when `None`
    /// (`KUBECONFIG`, then `~/.kube/config`)
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load the kubeconfig from disk
    pub fn read(&self) -> Result<Kubeconfig, KubeconfigError> {
        match &self.path {
            Some(path) => Kubeconfig::read_from(path),
            None => Kubeconfig::read(),
        }
    }
}

impl ContextResolver for KubeconfigResolver {
    fn current_context(&self) -> Result<ContextName, ConfigError> {
        let kubeconfig = self.read().map_err(ConfigError::Unreadable)?;
        current_context_of(&kubeconfig)
    }
}

/// Extract the current-context from a loaded kubeconfig
pub fn current_context_of(kubeconfig: &Kubeconfig) -> Result<ContextName, ConfigError> {
    kubeconfig
        .current_context
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(ContextName::from)
        .ok_or(ConfigError::NoCurrentContext)
}
