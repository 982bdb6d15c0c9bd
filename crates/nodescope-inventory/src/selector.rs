use std::fmt;

use nodescope_types::Node;

/// Label selector parsed from `"key=value,key=value"`
///
/// A node matches when any one pair matches exactly. Segments without `=`
/// or with an empty key are skipped; an empty selector matches everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelSelector {
    terms: Vec<(String, String)>,
}

impl LabelSelector {
    pub fn parse(expr: &str) -> Self {
        let terms = expr
            .split(',')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .filter_map(|segment| segment.split_once('='))
            .filter(|(key, _)| !key.is_empty())
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        Self { terms }
    }

    pub fn terms(&self) -> &[(String, String)] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn matches(&self, node: &Node) -> bool {
        self.terms
            .iter()
            .any(|(key, value)| node.label(key) == Some(value.as_str()))
    }

    /// Select matching nodes, preserving order
    pub fn filter(&self, nodes: &[Node]) -> Vec<Node> {
        if self.is_empty() {
            return nodes.to_vec();
        }
        nodes.iter().filter(|n| self.matches(n)).cloned().collect()
    }
}

impl From<&str> for LabelSelector {
    fn from(expr: &str) -> Self {
        Self::parse(expr)
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let expr = self
            .terms
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",");
        f.write_str(&expr)
    }
}
