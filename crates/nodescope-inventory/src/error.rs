use thiserror::Error;

use nodescope_k8s::{ClusterError, ConfigError, ViewError};

/// Hard failures of an inventory request
///
/// Metrics problems never show up here; they degrade usage to zero instead.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    /// Only raised under [`nodescope_k8s::DerivationPolicy::Abort`]
    #[error(transparent)]
    Derivation(#[from] ViewError),
}
