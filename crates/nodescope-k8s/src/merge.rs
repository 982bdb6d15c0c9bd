use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::{ClusterClient, RawMetricsSample, RawNode};
use crate::error::{ClusterError, MetricsError};
use nodescope_types::{ContextName, NodeUsage};

/// How long to wait for node metrics once the node list is in
pub const DEFAULT_METRICS_TIMEOUT: Duration = Duration::from_secs(10);

type MetricsResult = Result<HashMap<String, RawMetricsSample>, MetricsError>;

/// A raw node paired with its usage (zero when no sample arrived)
#[derive(Clone, Debug)]
pub struct MergedNode {
    pub raw: RawNode,
    pub usage: NodeUsage,
}

/// Fetches the node list and node metrics concurrently and joins them by name.
///
/// The node list is authoritative: its failure fails the fetch. Metrics are
/// best-effort: failure, timeout or a lost task all degrade to zero usage.
pub struct MetricsMerger<C> {
    client: Arc<C>,
    metrics_timeout: Duration,
}

impl<C: ClusterClient> MetricsMerger<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            metrics_timeout: DEFAULT_METRICS_TIMEOUT,
        }
    }

    pub fn with_metrics_timeout(mut self, timeout: Duration) -> Self {
        self.metrics_timeout = timeout;
        self
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Fetch and merge. Returns only once both calls have resolved.
    pub async fn fetch(&self, context: &ContextName) -> Result<Vec<MergedNode>, ClusterError> {
        // Start metrics first so its latency overlaps the node list call
        let metrics_task = self.spawn_metrics(context);

        let nodes = match self.client.list_nodes(context).await {
            Ok(nodes) => nodes,
            Err(e) => {
                metrics_task.abort();
                return Err(e);
            }
        };

        let usage = self.join_metrics(context, metrics_task).await;

        Ok(nodes
            .into_iter()
            .map(|raw| {
                let usage = raw
                    .metadata
                    .name
                    .as_deref()
                    .and_then(|name| usage.get(name))
                    .copied()
                    .unwrap_or_default();
                MergedNode { raw, usage }
            })
            .collect())
    }

    fn spawn_metrics(&self, context: &ContextName) -> JoinHandle<MetricsResult> {
        let client = Arc::clone(&self.client);
        let context = context.clone();
        tokio::spawn(async move { client.list_node_metrics(&context).await })
    }

    async fn join_metrics(
        &self,
        context: &ContextName,
        mut task: JoinHandle<MetricsResult>,
    ) -> HashMap<String, NodeUsage> {
        let result = match tokio::time::timeout(self.metrics_timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(MetricsError::TaskLost(join_error)),
            Err(_) => {
                task.abort();
                Err(MetricsError::TimedOut(self.metrics_timeout))
            }
        };

        match result {
            Ok(samples) => {
                debug!(context = %context, samples = samples.len(), "Merged node metrics");
                samples
                    .into_iter()
                    .map(|(name, sample)| (name, sample.to_usage()))
                    .collect()
            }
            Err(e) => {
                warn!(context = %context, error = %e, "Node metrics unavailable, reporting zero usage");
                HashMap::new()
            }
        }
    }
}
