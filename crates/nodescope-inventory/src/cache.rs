use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::error::InventoryError;
use nodescope_k8s::{ClusterClient, MetricsMerger, NodeViewBuilder};
use nodescope_types::{ContextName, Snapshot};

/// One node snapshot per context, refreshed only on a miss or when forced.
///
/// Snapshots are replaced wholesale behind an `Arc`, so readers never see a
/// partially refreshed list. Refreshes for the same context are serialized.
pub struct NodeInventoryCache<C> {
    merger: MetricsMerger<C>,
    builder: NodeViewBuilder,
    snapshots: RwLock<HashMap<ContextName, Arc<Snapshot>>>,
    refresh_locks: Mutex<HashMap<ContextName, Arc<tokio::sync::Mutex<()>>>>,
}

impl<C: ClusterClient> NodeInventoryCache<C> {
    pub fn new(merger: MetricsMerger<C>, builder: NodeViewBuilder) -> Self {
        Self {
            merger,
            builder,
            snapshots: RwLock::new(HashMap::new()),
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Get the snapshot for a context, fetching it on a miss or when
    /// `force_refresh` is set. A failed refresh leaves the old entry in place.
    pub async fn get(
        &self,
        context: &ContextName,
        force_refresh: bool,
    ) -> Result<Arc<Snapshot>, InventoryError> {
        if !force_refresh && let Some(snapshot) = self.cached(context) {
            debug!(context = %context, "Node inventory cache hit");
            return Ok(snapshot);
        }

        let lock = self.refresh_lock(context);
        let _guard = lock.lock().await;

        // Another request may have filled the entry while we waited
        if !force_refresh && let Some(snapshot) = self.cached(context) {
            debug!(context = %context, "Node inventory filled by concurrent refresh");
            return Ok(snapshot);
        }

        let snapshot = Arc::new(self.refresh(context).await?);
        self.snapshots
            .write()
            .insert(context.clone(), Arc::clone(&snapshot));

        Ok(snapshot)
    }

    /// Peek at the cached snapshot without touching the cluster
    pub fn cached(&self, context: &ContextName) -> Option<Arc<Snapshot>> {
        self.snapshots.read().get(context).cloned()
    }

    /// Drop the entry for one context
    pub fn invalidate(&self, context: &ContextName) {
        self.snapshots.write().remove(context);
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.snapshots.write().clear();
    }

    /// The cluster client refreshes go through
    pub fn client(&self) -> &Arc<C> {
        self.merger.client()
    }

    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.read().is_empty()
    }

    fn refresh_lock(&self, context: &ContextName) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.refresh_locks.lock();
        Arc::clone(locks.entry(context.clone()).or_default())
    }

    async fn refresh(&self, context: &ContextName) -> Result<Snapshot, InventoryError> {
        let start = Instant::now();
        info!(context = %context, "Refreshing node inventory");

        let merged = self.merger.fetch(context).await?;
        let nodes = self.builder.build_all(&merged)?;

        info!(
            context = %context,
            nodes = nodes.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Node inventory refreshed"
        );

        Ok(Snapshot::new(context.clone(), nodes))
    }
}
