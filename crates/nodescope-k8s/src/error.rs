use std::time::Duration;

use kube::config::KubeconfigError;
use thiserror::Error;

use nodescope_types::ContextName;

/// The kubeconfig cannot tell us which context is active
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read kubeconfig. Is kubectl configured?")]
    Unreadable(#[source] KubeconfigError),

    #[error("kubeconfig has no current-context set")]
    NoCurrentContext,
}

/// The node list could not be fetched
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("failed to create config for context: {context}")]
    Config {
        context: ContextName,
        #[source]
        source: KubeconfigError,
    },

    #[error("failed to create client for context: {context}")]
    Client {
        context: ContextName,
        #[source]
        source: kube::Error,
    },

    #[error("failed to list nodes in context: {context}")]
    ListNodes {
        context: ContextName,
        #[source]
        source: kube::Error,
    },
}

/// The node metrics could not be fetched. Never fatal to an inventory refresh.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("no client for the metrics API")]
    Client(#[from] ClusterError),

    #[error("failed to list node metrics in context: {context}")]
    ListMetrics {
        context: ContextName,
        #[source]
        source: kube::Error,
    },

    #[error("node metrics did not arrive within {0:?}")]
    TimedOut(Duration),

    #[error("node metrics task ended without a result")]
    TaskLost(#[source] tokio::task::JoinError),
}

/// Provider metadata on a single node cannot be turned into links
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ViewError {
    #[error("invalid provider id on node '{node}': {provider_id:?}")]
    MalformedProviderId { node: String, provider_id: String },

    #[error("no region info found on node '{node}'")]
    MissingRegion { node: String },
}
