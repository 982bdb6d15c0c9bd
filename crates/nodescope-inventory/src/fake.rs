//! In-memory cluster used by the tests

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use k8s_openapi::api::core::v1::{NodeSpec, NodeStatus};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::ErrorResponse;
use parking_lot::Mutex;

use nodescope_k8s::{
    ClusterClient, ClusterError, ConfigError, ContextResolver, MetricsError, RawMetricsSample,
    RawNode,
};
use nodescope_types::{ContextName, Node, NodeCapacity, NodeUsage};

pub fn raw_node(name: &str, labels: &[(&str, &str)]) -> RawNode {
    raw_node_with_provider_id(name, &format!("aws:///us-east-1a/i-{}", name), labels)
}

pub fn raw_node_with_provider_id(name: &str, provider_id: &str, labels: &[(&str, &str)]) -> RawNode {
    RawNode {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(
                labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            ..Default::default()
        },
        spec: Some(NodeSpec {
            provider_id: Some(provider_id.to_string()),
            ..Default::default()
        }),
        status: Some(NodeStatus {
            capacity: Some(BTreeMap::from([
                ("cpu".to_string(), Quantity("2".to_string())),
                ("memory".to_string(), Quantity("8Gi".to_string())),
            ])),
            ..Default::default()
        }),
    }
}

pub fn view_node(name: &str, labels: &[(&str, &str)]) -> Node {
    Node {
        name: name.to_string(),
        labels: labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        console_page_url: String::new(),
        dashboard_url: String::new(),
        instance_type: "unknown".to_string(),
        usage: NodeUsage::default(),
        capacity: NodeCapacity::default(),
    }
}

fn unavailable() -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: "the server is currently unable to handle the request".to_string(),
        reason: "ServiceUnavailable".to_string(),
        code: 503,
    })
}

/// Cluster whose responses and failures are scripted per context
#[derive(Default)]
pub struct FakeCluster {
    nodes: Mutex<HashMap<ContextName, Vec<RawNode>>>,
    metrics: Mutex<HashMap<ContextName, HashMap<String, RawMetricsSample>>>,
    node_calls: Mutex<HashMap<ContextName, usize>>,
    metrics_calls: Mutex<HashMap<ContextName, usize>>,
    fail_nodes: AtomicBool,
    fail_metrics: AtomicBool,
    delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeCluster {
    pub fn with_nodes(context: &ContextName, nodes: Vec<RawNode>) -> Self {
        let cluster = Self::default();
        cluster.set_nodes(context, nodes);
        cluster
    }

    pub fn set_nodes(&self, context: &ContextName, nodes: Vec<RawNode>) {
        self.nodes.lock().insert(context.clone(), nodes);
    }

    pub fn set_metrics<const N: usize>(
        &self,
        context: &ContextName,
        samples: [(&str, RawMetricsSample); N],
    ) {
        let samples = samples
            .into_iter()
            .map(|(name, sample)| (name.to_string(), sample))
            .collect();
        self.metrics.lock().insert(context.clone(), samples);
    }

    pub fn fail_nodes(&self, fail: bool) {
        self.fail_nodes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_metrics(&self, fail: bool) {
        self.fail_metrics.store(fail, Ordering::SeqCst);
    }

    /// Delay every node list call, to widen race windows
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn node_calls(&self, context: &ContextName) -> usize {
        self.node_calls.lock().get(context).copied().unwrap_or(0)
    }

    pub fn metrics_calls(&self, context: &ContextName) -> usize {
        self.metrics_calls.lock().get(context).copied().unwrap_or(0)
    }

    /// Highest number of node list calls that were running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl ClusterClient for FakeCluster {
    async fn list_nodes(&self, context: &ContextName) -> Result<Vec<RawNode>, ClusterError> {
        *self.node_calls.lock().entry(context.clone()).or_default() += 1;

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_nodes.load(Ordering::SeqCst) {
            return Err(ClusterError::ListNodes {
                context: context.clone(),
                source: unavailable(),
            });
        }
        Ok(self
            .nodes
            .lock()
            .get(context)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_node_metrics(
        &self,
        context: &ContextName,
    ) -> Result<HashMap<String, RawMetricsSample>, MetricsError> {
        *self.metrics_calls.lock().entry(context.clone()).or_default() += 1;

        if self.fail_metrics.load(Ordering::SeqCst) {
            return Err(MetricsError::ListMetrics {
                context: context.clone(),
                source: unavailable(),
            });
        }
        Ok(self
            .metrics
            .lock()
            .get(context)
            .cloned()
            .unwrap_or_default())
    }
}

/// Context resolver whose answer can be switched between calls
#[derive(Default)]
pub struct FakeResolver {
    current: Mutex<Option<ContextName>>,
}

impl FakeResolver {
    pub fn new(context: &ContextName) -> Self {
        Self {
            current: Mutex::new(Some(context.clone())),
        }
    }

    pub fn switch_to(&self, context: Option<&ContextName>) {
        *self.current.lock() = context.cloned();
    }
}

impl ContextResolver for FakeResolver {
    fn current_context(&self) -> Result<ContextName, ConfigError> {
        self.current.lock().clone().ok_or(ConfigError::NoCurrentContext)
    }
}
