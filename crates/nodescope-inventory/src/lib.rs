//! Node inventory for nodescope
//!
//! This crate caches one node snapshot per cluster context, derives the
//! label index and applies label selectors, and exposes the calls a front
//! end makes through [`NodesService`].

mod cache;
mod error;
mod labels;
mod selector;
mod service;

#[cfg(test)]
mod fake;

pub use cache::NodeInventoryCache;
pub use error::InventoryError;
pub use labels::build_label_index;
pub use selector::LabelSelector;
pub use service::NodesService;

// Re-export types used in our public API
pub use nodescope_types::{ContextName, LabelIndex, Node, QueriedNodes, Snapshot};
