//! Index-based adjacency over a [`FlowGraph`], built once per pass so the
//! BFS and path probes in the structurer and the CFG adapter run on integer
//! indices instead of hashing string ids in their inner loops.

use std::collections::{HashMap, HashSet};

use petgraph::algo::{astar, dijkstra};
use petgraph::graph::{DiGraph, NodeIndex};

use super::FlowGraph;

pub struct Adjacency {
    /// Node weights index into `FlowGraph::nodes`, edge weights into
    /// `FlowGraph::edges`.
    graph: DiGraph<usize, usize>,
    index_of: HashMap<String, NodeIndex>,
    edge_targets: HashMap<usize, NodeIndex>,
}

impl Adjacency {
    #[must_use]
    pub fn new(flow: &FlowGraph) -> Self {
        let mut graph = DiGraph::new();
        let mut index_of = HashMap::new();
        let mut edge_targets = HashMap::new();
        for (i, node) in flow.nodes.iter().enumerate() {
            let ix = graph.add_node(i);
            index_of.insert(node.id.clone(), ix);
        }
        for (i, edge) in flow.edges.iter().enumerate() {
            // Edges pointing at unknown nodes are dropped here; the
            // diagnostics scan reports them separately.
            if let (Some(&from), Some(&to)) = (index_of.get(&edge.from), index_of.get(&edge.to)) {
                graph.add_edge(from, to, i);
                edge_targets.insert(i, to);
            }
        }
        Self {
            graph,
            index_of,
            edge_targets,
        }
    }

    pub fn index(&self, id: &str) -> Option<NodeIndex> {
        self.index_of.get(id).copied()
    }

    pub fn node_pos(&self, ix: NodeIndex) -> usize {
        self.graph[ix]
    }

    /// Outgoing edges as indices into `FlowGraph::edges`, in insertion order.
    pub fn out_edge_indices(&self, ix: NodeIndex) -> Vec<usize> {
        let mut out: Vec<usize> = self.graph.edges(ix).map(|e| *e.weight()).collect();
        out.sort_unstable();
        out
    }

    pub fn edge_target(&self, edge_pos: usize) -> Option<NodeIndex> {
        self.edge_targets.get(&edge_pos).copied()
    }

    /// BFS distance map over the forward adjacency.
    pub fn distances(&self, from: NodeIndex) -> HashMap<NodeIndex, usize> {
        dijkstra(&self.graph, from, None, |_| 1usize)
            .into_iter()
            .collect()
    }

    /// Shortest node sequence from `from` to `to`, inclusive.
    pub fn path(&self, from: NodeIndex, to: NodeIndex) -> Option<Vec<NodeIndex>> {
        astar(&self.graph, from, |n| n == to, |_| 1, |_| 0).map(|(_, path)| path)
    }

    /// Like [`Adjacency::path`], but never expands nodes in `avoid`. Used by
    /// the loop probe so a path may not escape the region being structured
    /// (e.g. through an enclosing loop's back-edge).
    pub fn path_avoiding(
        &self,
        from: NodeIndex,
        to: NodeIndex,
        avoid: &HashSet<NodeIndex>,
    ) -> Option<Vec<NodeIndex>> {
        if from == to {
            return Some(vec![from]);
        }
        let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut seen: HashSet<NodeIndex> = avoid.clone();
        seen.insert(from);
        let mut queue = std::collections::VecDeque::from([from]);
        while let Some(n) = queue.pop_front() {
            for e in self.out_edge_indices(n) {
                let Some(t) = self.edge_target(e) else {
                    continue;
                };
                if t == to {
                    let mut path = vec![to, n];
                    let mut cur = n;
                    while let Some(&p) = parent.get(&cur) {
                        path.push(p);
                        cur = p;
                    }
                    path.reverse();
                    return Some(path);
                }
                if seen.insert(t) {
                    parent.insert(t, n);
                    queue.push_back(t);
                }
            }
        }
        None
    }

    /// Lowest-numbered edge directly connecting `from` to `to`.
    pub fn connecting_edge(&self, from: NodeIndex, to: NodeIndex) -> Option<usize> {
        self.graph
            .edges_connecting(from, to)
            .map(|e| *e.weight())
            .min()
    }

    pub fn reachable(&self, from: NodeIndex) -> HashSet<NodeIndex> {
        self.distances(from).into_keys().collect()
    }

    pub fn in_degree(&self, ix: NodeIndex) -> usize {
        self.graph
            .edges_directed(ix, petgraph::Direction::Incoming)
            .count()
    }
}
