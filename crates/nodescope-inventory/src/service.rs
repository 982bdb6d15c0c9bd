use std::sync::Arc;

use tracing::debug;

use crate::cache::NodeInventoryCache;
use crate::error::InventoryError;
use crate::labels::build_label_index;
use crate::selector::LabelSelector;
use nodescope_k8s::{ClusterClient, ConfigError, ContextResolver};
use nodescope_types::{ContextName, QueriedNodes, Snapshot};

/// The calls a front end makes: list nodes for the current context, and
/// report which context that is.
pub struct NodesService<R, C> {
    resolver: R,
    cache: NodeInventoryCache<C>,
}

impl<R: ContextResolver, C: ClusterClient> NodesService<R, C> {
    pub fn new(resolver: R, cache: NodeInventoryCache<C>) -> Self {
        Self { resolver, cache }
    }

    /// Name of the active kubeconfig context
    pub fn current_context(&self) -> Result<ContextName, ConfigError> {
        self.resolver.current_context()
    }

    /// Snapshot for the active context, refetched when `clear_cache` is set
    pub async fn inventory(&self, clear_cache: bool) -> Result<Arc<Snapshot>, InventoryError> {
        let context = self.current_context()?;
        self.cache.get(&context, clear_cache).await
    }

    /// Nodes of the active context matching `label_selectors`, plus the
    /// label index over every node in the snapshot
    pub async fn list_nodes(
        &self,
        clear_cache: bool,
        label_selectors: &str,
    ) -> Result<QueriedNodes, InventoryError> {
        let (_, queried) = self.query(clear_cache, label_selectors).await?;
        Ok(queried)
    }

    /// Like [`list_nodes`](Self::list_nodes), also returning the snapshot the
    /// selection was taken from
    pub async fn query(
        &self,
        clear_cache: bool,
        label_selectors: &str,
    ) -> Result<(Arc<Snapshot>, QueriedNodes), InventoryError> {
        let snapshot = self.inventory(clear_cache).await?;
        let selector = LabelSelector::parse(label_selectors);

        let labels = build_label_index(&snapshot.nodes);
        let nodes = selector.filter(&snapshot.nodes);
        debug!(
            context = %snapshot.context,
            selector = %selector,
            total = snapshot.nodes.len(),
            selected = nodes.len(),
            "Listed nodes"
        );

        Ok((snapshot, QueriedNodes { nodes, labels }))
    }

    pub fn cache(&self) -> &NodeInventoryCache<C> {
        &self.cache
    }
}
