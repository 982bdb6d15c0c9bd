use std::collections::{BTreeMap, HashMap};
use std::future::Future;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::Api;
use kube::api::{ApiResource, DynamicObject, GroupVersionKind, ListParams};
use kube::config::KubeConfigOptions;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::context::KubeconfigResolver;
use crate::error::{ClusterError, MetricsError};
use crate::quantity;
use nodescope_types::{ContextName, NodeUsage};

/// Node object as returned by the core/v1 API
pub type RawNode = k8s_openapi::api::core::v1::Node;

/// Page size for node list requests
const PAGE_SIZE: u32 = 500;

/// One `metrics.k8s.io/v1beta1` NodeMetrics item, minus its metadata
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct RawMetricsSample {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub window: Option<String>,
    #[serde(default)]
    pub usage: BTreeMap<String, Quantity>,
}

impl RawMetricsSample {
    pub fn new(cpu: &str, memory: &str) -> Self {
        Self {
            usage: BTreeMap::from([
                ("cpu".to_string(), Quantity(cpu.to_string())),
                ("memory".to_string(), Quantity(memory.to_string())),
            ]),
            ..Default::default()
        }
    }

    /// Convert the sample to millicores and bytes; unparsable figures become 0
    pub fn to_usage(&self) -> NodeUsage {
        NodeUsage {
            cpu: self
                .usage
                .get("cpu")
                .and_then(quantity::cpu_millis)
                .unwrap_or(0),
            memory: self
                .usage
                .get("memory")
                .and_then(quantity::memory_bytes)
                .unwrap_or(0),
        }
    }
}

/// The two cluster queries the inventory is built from
///
/// Node-list failures and metrics failures are distinct error types so the
/// caller can treat a metrics-server outage as non-fatal.
pub trait ClusterClient: Send + Sync + 'static {
    /// List every node in the cluster
    fn list_nodes(
        &self,
        context: &ContextName,
    ) -> impl Future<Output = Result<Vec<RawNode>, ClusterError>> + Send;

    /// Fetch current usage samples keyed by node name
    fn list_node_metrics(
        &self,
        context: &ContextName,
    ) -> impl Future<Output = Result<HashMap<String, RawMetricsSample>, MetricsError>> + Send;
}

/// [`ClusterClient`] backed by kube, with one client cached per context
pub struct KubeClusterClient {
    resolver: KubeconfigResolver,
    clients: RwLock<HashMap<ContextName, kube::Client>>,
}

impl KubeClusterClient {
    pub fn new(resolver: KubeconfigResolver) -> Self {
        Self {
            resolver,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create the kube::Client for a context
    ///
    /// Creation happens under the write lock so concurrent first calls for a
    /// context build a single client.
    pub async fn client_for_context(
        &self,
        context: &ContextName,
    ) -> Result<kube::Client, ClusterError> {
        if let Some(client) = self.clients.read().await.get(context) {
            return Ok(client.clone());
        }

        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get(context) {
            return Ok(client.clone());
        }

        let kubeconfig = self
            .resolver
            .read()
            .map_err(|source| ClusterError::Config {
                context: context.clone(),
                source,
            })?;

        let config = kube::Config::from_custom_kubeconfig(
            kubeconfig,
            &KubeConfigOptions {
                context: Some(context.to_string()),
                ..Default::default()
            },
        )
        .await
        .map_err(|source| ClusterError::Config {
            context: context.clone(),
            source,
        })?;

        let client = kube::Client::try_from(config).map_err(|source| ClusterError::Client {
            context: context.clone(),
            source,
        })?;

        debug!(context = %context, "Created cluster client");
        clients.insert(context.clone(), client.clone());

        Ok(client)
    }

    fn node_metrics_resource() -> ApiResource {
        let gvk = GroupVersionKind::gvk("metrics.k8s.io", "v1beta1", "NodeMetrics");
        ApiResource::from_gvk_with_plural(&gvk, "nodes")
    }
}

impl ClusterClient for KubeClusterClient {
    async fn list_nodes(&self, context: &ContextName) -> Result<Vec<RawNode>, ClusterError> {
        let client = self.client_for_context(context).await?;
        list_all_nodes(client, context).await
    }

    async fn list_node_metrics(
        &self,
        context: &ContextName,
    ) -> Result<HashMap<String, RawMetricsSample>, MetricsError> {
        let client = self.client_for_context(context).await?;
        fetch_node_metrics(client, context).await
    }
}

async fn list_all_nodes(
    client: kube::Client,
    context: &ContextName,
) -> Result<Vec<RawNode>, ClusterError> {
    let api: Api<RawNode> = Api::all(client);

    let mut nodes = Vec::new();
    let mut continue_token: Option<String> = None;

    loop {
        let mut params = ListParams::default().limit(PAGE_SIZE);
        if let Some(token) = &continue_token {
            params = params.continue_token(token);
        }

        let list = api
            .list(&params)
            .await
            .map_err(|source| ClusterError::ListNodes {
                context: context.clone(),
                source,
            })?;
        nodes.extend(list.items);

        match list.metadata.continue_ {
            Some(token) if !token.is_empty() => continue_token = Some(token),
            _ => break,
        }
    }

    debug!(context = %context, nodes = nodes.len(), "Listed nodes");
    Ok(nodes)
}

async fn fetch_node_metrics(
    client: kube::Client,
    context: &ContextName,
) -> Result<HashMap<String, RawMetricsSample>, MetricsError> {
    let resource = KubeClusterClient::node_metrics_resource();
    let api: Api<DynamicObject> = Api::all_with(client, &resource);

    let list = api
        .list(&ListParams::default())
        .await
        .map_err(|source| MetricsError::ListMetrics {
            context: context.clone(),
            source,
        })?;

    let mut samples = HashMap::with_capacity(list.items.len());
    for item in list.items {
        let Some(name) = item.metadata.name else {
            continue;
        };
        match serde_json::from_value::<RawMetricsSample>(item.data) {
            Ok(sample) => {
                samples.insert(name, sample);
            }
            Err(e) => {
                warn!(context = %context, node = %name, error = %e, "Skipping malformed node metrics");
            }
        }
    }

    debug!(context = %context, samples = samples.len(), "Listed node metrics");
    Ok(samples)
}
