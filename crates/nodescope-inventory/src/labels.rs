use nodescope_types::{LabelIndex, Node};

/// Index every label key to its distinct values, in first-seen order
pub fn build_label_index(nodes: &[Node]) -> LabelIndex {
    let mut index = LabelIndex::new();
    for node in nodes {
        for (key, value) in &node.labels {
            index.insert(key, value);
        }
    }
    index
}
