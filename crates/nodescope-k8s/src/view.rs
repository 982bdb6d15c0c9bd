use serde::Deserialize;
use tracing::{debug, warn};

use crate::client::RawNode;
use crate::error::ViewError;
use crate::merge::MergedNode;
use crate::quantity;
use nodescope_types::{Node, NodeCapacity, NodeUsage};

pub const REGION_LABEL: &str = "topology.kubernetes.io/region";
pub const INSTANCE_TYPE_LABEL: &str = "node.kubernetes.io/instance-type";
pub const UNKNOWN_INSTANCE_TYPE: &str = "unknown";
pub const DEFAULT_DASHBOARD_BASE_URL: &str = "https://app.datadoghq.com/dash/host_name/";

/// What to do with a node whose provider metadata cannot produce links
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DerivationPolicy {
    /// Keep the node and leave the underivable links empty
    #[default]
    Placeholder,
    /// Fail the whole inventory refresh
    Abort,
}

/// Converts raw nodes plus usage into [`Node`] views
#[derive(Clone, Debug)]
pub struct NodeViewBuilder {
    dashboard_base_url: String,
    policy: DerivationPolicy,
}

impl Default for NodeViewBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeViewBuilder {
    pub fn new() -> Self {
        Self {
            dashboard_base_url: DEFAULT_DASHBOARD_BASE_URL.to_string(),
            policy: DerivationPolicy::default(),
        }
    }

    pub fn with_dashboard_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.dashboard_base_url = base_url.into();
        self
    }

    pub fn with_policy(mut self, policy: DerivationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> DerivationPolicy {
        self.policy
    }

    /// Build the view for one node
    pub fn build(&self, raw: &RawNode, usage: NodeUsage) -> Result<Node, ViewError> {
        let name = raw.metadata.name.clone().unwrap_or_default();

        let instance_id = parse_instance_id(raw);
        let dashboard_url = instance_id
            .as_deref()
            .map(|id| self.dashboard_url(id))
            .map_err(Clone::clone);
        let console_page_url = instance_id
            .as_deref()
            .map_err(Clone::clone)
            .and_then(|id| region(raw).map(|region| console_page_url(region, id)));

        let (console_page_url, dashboard_url) = match (console_page_url, dashboard_url) {
            (Ok(console), Ok(dashboard)) => (console, dashboard),
            (Err(error), dashboard) => {
                self.placeholder(&name, error, String::new(), dashboard.unwrap_or_default())?
            }
            (Ok(console), Err(error)) => self.placeholder(&name, error, console, String::new())?,
        };

        Ok(Node {
            labels: raw.metadata.labels.clone().unwrap_or_default(),
            console_page_url,
            dashboard_url,
            instance_type: instance_type(raw).to_string(),
            usage,
            capacity: capacity(raw),
            name,
        })
    }

    /// Build views for a merged batch, preserving order
    pub fn build_all(&self, merged: &[MergedNode]) -> Result<Vec<Node>, ViewError> {
        merged
            .iter()
            .map(|node| self.build(&node.raw, node.usage))
            .collect()
    }

    /// Apply the derivation policy to a node whose links could not all be built
    fn placeholder(
        &self,
        node: &str,
        error: ViewError,
        console_page_url: String,
        dashboard_url: String,
    ) -> Result<(String, String), ViewError> {
        if self.policy == DerivationPolicy::Abort {
            return Err(error);
        }
        warn!(node = %node, error = %error, "Cannot derive node links, leaving them empty");
        Ok((console_page_url, dashboard_url))
    }

    fn dashboard_url(&self, instance_id: &str) -> String {
        format!("{}{}", self.dashboard_base_url, instance_id)
    }
}

/// Instance id: the last non-empty path segment of `spec.providerID`
///
/// `aws:///us-east-1a/i-0123` yields `i-0123`. An id without a `/`, or with
/// only empty segments, is malformed.
pub fn parse_instance_id(raw: &RawNode) -> Result<String, ViewError> {
    let provider_id = raw
        .spec
        .as_ref()
        .and_then(|spec| spec.provider_id.as_deref())
        .unwrap_or_default();

    let malformed = || ViewError::MalformedProviderId {
        node: raw.metadata.name.clone().unwrap_or_default(),
        provider_id: provider_id.to_string(),
    };

    let segments: Vec<&str> = provider_id.split('/').collect();
    if segments.len() < 2 {
        return Err(malformed());
    }

    segments
        .iter()
        .rev()
        .find(|segment| !segment.is_empty())
        .map(|segment| segment.to_string())
        .ok_or_else(malformed)
}

/// Cloud region from the well-known topology label
pub fn region(raw: &RawNode) -> Result<&str, ViewError> {
    raw.metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(REGION_LABEL))
        .map(String::as_str)
        .ok_or_else(|| ViewError::MissingRegion {
            node: raw.metadata.name.clone().unwrap_or_default(),
        })
}

/// EC2 console page of the instance
pub fn console_page_url(region: &str, instance_id: &str) -> String {
    format!(
        "https://{region}.console.aws.amazon.com/ec2/home?region={region}#InstanceDetails:instanceId={instance_id}"
    )
}

/// Instance type label, or `"unknown"` for nodes without one
pub fn instance_type(raw: &RawNode) -> &str {
    raw.metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(INSTANCE_TYPE_LABEL))
        .map(String::as_str)
        .unwrap_or(UNKNOWN_INSTANCE_TYPE)
}

fn capacity(raw: &RawNode) -> NodeCapacity {
    let Some(capacity) = raw.status.as_ref().and_then(|s| s.capacity.as_ref()) else {
        return NodeCapacity::default();
    };

    let cpu = capacity.get("cpu").and_then(quantity::cpu_millis);
    let memory = capacity.get("memory").and_then(quantity::memory_bytes);
    if cpu.is_none() || memory.is_none() {
        debug!(
            node = ?raw.metadata.name,
            cpu = ?capacity.get("cpu"),
            memory = ?capacity.get("memory"),
            "Node capacity missing or unparsable"
        );
    }

    NodeCapacity {
        cpu: cpu.unwrap_or(0),
        memory: memory.unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{NodeSpec, NodeStatus};
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn raw_node(provider_id: &str, labels: &[(&str, &str)]) -> RawNode {
        RawNode {
            metadata: ObjectMeta {
                name: Some("ip-10-0-1-23.ec2.internal".to_string()),
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
                    ("cpu".to_string(), Quantity("4".to_string())),
                    ("memory".to_string(), Quantity("16Gi".to_string())),
                    ("pods".to_string(), Quantity("110".to_string())),
                ])),
                ..Default::default()
            }),
        }
    }

    fn aws_node() -> RawNode {
        raw_node(
            "aws:///us-east-1a/i-0123",
            &[
                (REGION_LABEL, "us-east-1"),
                (INSTANCE_TYPE_LABEL, "m5.xlarge"),
                ("env", "prod"),
            ],
        )
    }

    #[test]
    fn test_build_aws_node() {
        let usage = NodeUsage {
            cpu: 250,
            memory: 1024,
        };
        let node = NodeViewBuilder::new().build(&aws_node(), usage).unwrap();

        assert_eq!(node.name, "ip-10-0-1-23.ec2.internal");
        assert!(node.console_page_url.contains("region=us-east-1"));
        assert!(node.console_page_url.contains("instanceId=i-0123"));
        assert!(node.console_page_url.starts_with("https://us-east-1.console.aws.amazon.com/"));
        assert!(node.dashboard_url.ends_with("i-0123"));
        assert_eq!(node.instance_type, "m5.xlarge");
        assert_eq!(node.usage, usage);
        assert_eq!(node.capacity.cpu, 4000);
        assert_eq!(node.capacity.memory, 16 * 1024 * 1024 * 1024);
        assert_eq!(node.label("env"), Some("prod"));
    }

    #[test]
    fn test_parse_instance_id() {
        assert_eq!(parse_instance_id(&aws_node()).unwrap(), "i-0123");
        assert_eq!(
            parse_instance_id(&raw_node("aws:///us-east-1a/i-0123/", &[])).unwrap(),
            "i-0123"
        );
        assert_eq!(
            parse_instance_id(&raw_node("gce://project/zone/vm-1", &[])).unwrap(),
            "vm-1"
        );
        assert_eq!(parse_instance_id(&raw_node("a/b", &[])).unwrap(), "b");
        assert_eq!(parse_instance_id(&raw_node("foo/", &[])).unwrap(), "foo");
        assert_eq!(parse_instance_id(&raw_node("i-0123//", &[])).unwrap(), "i-0123");
    }

    #[test]
    fn test_malformed_provider_id() {
        for provider_id in ["garbage", "", "/", "///"] {
            let err = parse_instance_id(&raw_node(provider_id, &[])).unwrap_err();
            assert_eq!(
                err,
                ViewError::MalformedProviderId {
                    node: "ip-10-0-1-23.ec2.internal".to_string(),
                    provider_id: provider_id.to_string(),
                }
            );
        }
    }

    #[test]
    fn test_missing_provider_id_is_malformed() {
        let mut raw = aws_node();
        raw.spec = None;
        assert!(matches!(
            parse_instance_id(&raw),
            Err(ViewError::MalformedProviderId { .. })
        ));
    }

    #[test]
    fn test_missing_region() {
        let raw = raw_node("aws:///us-east-1a/i-0123", &[]);
        assert!(matches!(region(&raw), Err(ViewError::MissingRegion { .. })));
    }

    #[test]
    fn test_instance_type_defaults_to_unknown() {
        let raw = raw_node("aws:///us-east-1a/i-0123", &[(REGION_LABEL, "us-east-1")]);
        assert_eq!(instance_type(&raw), UNKNOWN_INSTANCE_TYPE);
    }

    #[test]
    fn test_missing_capacity_is_zero() {
        let mut raw = aws_node();
        raw.status = None;
        let node = NodeViewBuilder::new()
            .build(&raw, NodeUsage::default())
            .unwrap();
        assert_eq!(node.capacity, NodeCapacity::default());
    }

    #[test]
    fn test_placeholder_policy_keeps_malformed_node() {
        let raw = raw_node("garbage", &[(REGION_LABEL, "us-east-1")]);
        let node = NodeViewBuilder::new()
            .build(&raw, NodeUsage::default())
            .unwrap();

        assert_eq!(node.console_page_url, "");
        assert_eq!(node.dashboard_url, "");
        assert_eq!(node.capacity.cpu, 4000);
    }

    #[test]
    fn test_placeholder_policy_keeps_dashboard_without_region() {
        let raw = raw_node("aws:///us-east-1a/i-0123", &[]);
        let node = NodeViewBuilder::new()
            .build(&raw, NodeUsage::default())
            .unwrap();

        assert_eq!(node.console_page_url, "");
        assert!(node.dashboard_url.ends_with("i-0123"));
    }

    #[test]
    fn test_abort_policy_rejects_malformed_node() {
        let builder = NodeViewBuilder::new().with_policy(DerivationPolicy::Abort);

        let raw = raw_node("garbage", &[(REGION_LABEL, "us-east-1")]);
        assert!(matches!(
            builder.build(&raw, NodeUsage::default()),
            Err(ViewError::MalformedProviderId { .. })
        ));

        let raw = raw_node("aws:///us-east-1a/i-0123", &[]);
        assert!(matches!(
            builder.build(&raw, NodeUsage::default()),
            Err(ViewError::MissingRegion { .. })
        ));
    }

    #[test]
    fn test_custom_dashboard_base_url() {
        let node = NodeViewBuilder::new()
            .with_dashboard_base_url("https://grafana.example.com/d/node?host=")
            .build(&aws_node(), NodeUsage::default())
            .unwrap();
        assert_eq!(
            node.dashboard_url,
            "https://grafana.example.com/d/node?host=i-0123"
        );
    }

    #[test]
    fn test_build_all_preserves_order() {
        let mut second = aws_node();
        second.metadata.name = Some("second".to_string());
        let merged = vec![
            MergedNode {
                raw: aws_node(),
                usage: NodeUsage::default(),
            },
            MergedNode {
                raw: second,
                usage: NodeUsage::default(),
            },
        ];
        let nodes = NodeViewBuilder::new().build_all(&merged).unwrap();
        assert_eq!(nodes[0].name, "ip-10-0-1-23.ec2.internal");
        assert_eq!(nodes[1].name, "second");
    }

    #[test]
    fn test_policy_deserializes_lowercase() {
        let policy: DerivationPolicy = serde_json::from_str(r#""abort""#).unwrap();
        assert_eq!(policy, DerivationPolicy::Abort);
    }
}
