//! Kubernetes client for nodescope
//!
//! This crate provides kubeconfig context resolution, the node and node
//! metrics queries, the concurrent merge of both, and the conversion of
//! raw node objects into the [`Node`] view.

mod client;
mod context;
mod error;
mod merge;
pub mod quantity;
mod view;

pub use client::{ClusterClient, KubeClusterClient, RawMetricsSample, RawNode};
pub use context::{ContextResolver, KubeconfigResolver, current_context_of};
pub use error::{ClusterError, ConfigError, MetricsError, ViewError};
pub use merge::{DEFAULT_METRICS_TIMEOUT, MergedNode, MetricsMerger};
pub use view::{
    DEFAULT_DASHBOARD_BASE_URL, DerivationPolicy, INSTANCE_TYPE_LABEL, NodeViewBuilder,
    REGION_LABEL, UNKNOWN_INSTANCE_TYPE, console_page_url, instance_type, parse_instance_id,
    region,
};

// Re-export types that are used in our public API
pub use nodescope_types::{ContextName, Node, NodeCapacity, NodeUsage};
