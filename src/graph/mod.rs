//! Flow-graph model shared by the builder, the structurer and the CFG
//! adapter, plus the join normalization both producers run before handing a
//! graph to the outside.
//!
//! Node shapes and edge labels are fixed vocabularies: the layout engine,
//! the renderer and the structurer all pattern-match on them exactly.

pub mod analysis;
pub mod build;
pub mod structure;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    StartEnd,
    Process,
    Decision,
    Io,
    Subroutine,
    Connector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeLabel {
    Yes,
    No,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub shape: Shape,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_line: Option<usize>,
    /// Pixel position, owned by the external layout engine. Producers emit 0.
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<EdgeLabel>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlowGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl FlowGraph {
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn out_edges(&self, id: &str) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.from == id)
    }

    pub fn in_degree(&self, id: &str) -> usize {
        self.edges.iter().filter(|e| e.to == id).count()
    }
}

/// Allocates node and edge identifiers for one translation pass. Ids are
/// only meaningful within the graph they were minted for; reusing them
/// across independently built graphs would break join and back-edge
/// detection, which compares identity, not position.
#[derive(Debug, Default)]
pub struct IdAlloc {
    next: usize,
}

impl IdAlloc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocator whose first id is `n<next>`. Used when minting into a graph
    /// that already carries ids, to keep fresh ids out of the occupied range.
    pub fn starting_at(next: usize) -> Self {
        Self { next }
    }

    pub fn node(&mut self) -> String {
        format!("n{}", self.bump())
    }

    pub fn join(&mut self) -> String {
        format!("__join__{}", self.bump())
    }

    pub fn edge(&mut self) -> String {
        format!("e{}", self.bump())
    }

    fn bump(&mut self) -> usize {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Removes degenerate connectors: a connector with no incoming edges is
/// dropped along with its outgoing edges, and a connector with exactly one
/// incoming and one outgoing edge is spliced out (the incoming edge keeps
/// its label). Running this on an already-normalized graph changes nothing.
#[must_use]
pub fn normalize_joins(mut graph: FlowGraph) -> FlowGraph {
    loop {
        let degenerate = graph.nodes.iter().find_map(|n| {
            if n.shape != Shape::Connector {
                return None;
            }
            let ins = graph.edges.iter().filter(|e| e.to == n.id).count();
            let outs = graph.edges.iter().filter(|e| e.from == n.id).count();
            (ins == 0 || (ins == 1 && outs == 1)).then(|| (n.id.clone(), ins))
        });
        let Some((id, ins)) = degenerate else {
            return graph;
        };
        if ins == 0 {
            graph.edges.retain(|e| e.from != id);
        } else {
            let target = graph
                .edges
                .iter()
                .find(|e| e.from == id)
                .map(|e| e.to.clone())
                .unwrap();
            for edge in &mut graph.edges {
                if edge.to == id {
                    edge.to = target.clone();
                }
            }
            graph.edges.retain(|e| e.from != id);
        }
        graph.nodes.retain(|n| n.id != id);
    }
}
