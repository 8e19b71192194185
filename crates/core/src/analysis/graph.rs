use serde::{Deserialize, Serialize};

use crate::source::SourceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraphNode {
    Source(SourceId),
    Analyser,
    Destination,
}

/// Directed connections of the processing graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalGraph {
    edges: Vec<(GraphNode, GraphNode)>,
}

impl SignalGraph {
    /// Attaches `source` in front of the analyser. Any previous source edge is
    /// removed first, so repeated calls never duplicate a path.
    pub fn connect(&mut self, source: SourceId) {
        self.disconnect_sources();
        self.add_edge(GraphNode::Source(source), GraphNode::Analyser);
        self.add_edge(GraphNode::Analyser, GraphNode::Destination);
    }

    pub fn disconnect_sources(&mut self) {
        self.edges
            .retain(|(from, _)| !matches!(from, GraphNode::Source(_)));
    }

    pub fn connected_source(&self) -> Option<SourceId> {
        self.edges.iter().find_map(|edge| match edge {
            (GraphNode::Source(id), GraphNode::Analyser) => Some(*id),
            _ => None,
        })
    }

    /// Number of signal paths feeding the analyser.
    pub fn active_paths(&self) -> usize {
        self.edges
            .iter()
            .filter(|(_, to)| *to == GraphNode::Analyser)
            .count()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> &[(GraphNode, GraphNode)] {
        &self.edges
    }

    fn add_edge(&mut self, from: GraphNode, to: GraphNode) {
        if !self.edges.contains(&(from, to)) {
            self.edges.push((from, to));
        }
    }
}
