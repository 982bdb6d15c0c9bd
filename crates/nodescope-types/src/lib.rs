//! Shared types for nodescope
//!
//! This crate contains the view model handed to front ends: the node
//! entity, its usage and capacity figures, cached snapshots and the
//! label index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Cluster Context
// ============================================================================

/// Name of a kubeconfig context, used as the cache partition key
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextName(String);

impl ContextName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContextName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ContextName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ContextName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Node View
// ============================================================================

/// Instantaneous resource usage reported by the metrics API
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeUsage {
    /// CPU usage in millicores
    pub cpu: i64,
    /// Memory usage in bytes
    pub memory: i64,
}

/// Resource capacity reported by the node status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCapacity {
    /// CPU capacity in millicores
    pub cpu: i64,
    /// Memory capacity in bytes
    pub memory: i64,
}

/// A cluster node as presented to the front end
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    #[serde(rename = "consolePageURL")]
    pub console_page_url: String,
    #[serde(rename = "dashboardURL")]
    pub dashboard_url: String,
    #[serde(rename = "instanceType")]
    pub instance_type: String,
    pub usage: NodeUsage,
    pub capacity: NodeCapacity,
}

impl Node {
    /// Value of a label, if the node carries it
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// CPU usage as a percentage of capacity (None when capacity is unknown)
    pub fn cpu_percent(&self) -> Option<f64> {
        percent(self.usage.cpu, self.capacity.cpu)
    }

    /// Memory usage as a percentage of capacity (None when capacity is unknown)
    pub fn memory_percent(&self) -> Option<f64> {
        percent(self.usage.memory, self.capacity.memory)
    }
}

fn percent(used: i64, total: i64) -> Option<f64> {
    if total <= 0 {
        return None;
    }
    Some(used as f64 * 100.0 / total as f64)
}

// ============================================================================
// Inventory
// ============================================================================

/// Fully materialized node list for one context at one point in time
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub context: ContextName,
    pub created_at: DateTime<Utc>,
    pub nodes: Vec<Node>,
}

impl Snapshot {
    pub fn new(context: ContextName, nodes: Vec<Node>) -> Self {
        Self {
            context,
            created_at: Utc::now(),
            nodes,
        }
    }

    /// Time elapsed since the snapshot was taken
    pub fn age(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.created_at)
    }
}

/// Distinct label values per key, in first-seen order
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelIndex(BTreeMap<String, Vec<String>>);

impl LabelIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value under a key unless it was already seen for that key
    pub fn insert(&mut self, key: &str, value: &str) {
        let values = self.0.entry(key.to_string()).or_default();
        if !values.iter().any(|v| v == value) {
            values.push(value.to_string());
        }
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Response of a node listing: the selected nodes plus the label index
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueriedNodes {
    pub nodes: Vec<Node>,
    pub labels: LabelIndex,
}
