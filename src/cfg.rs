//! Adapter for an authoritative, externally-computed CFG.
//!
//! A real parser backend hands over nodes and edges with its own kind
//! vocabulary; this pass maps them onto the flow model and then flattens
//! `if/elif/.../else` decision chains onto one shared connector, so a graph
//! imported from the backend obeys the same join invariant as a graph built
//! from lite-source.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::graph::analysis::Adjacency;
use crate::graph::{Edge, EdgeLabel, FlowGraph, IdAlloc, Node, Shape, normalize_joins};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalCfg {
    pub nodes: Vec<ExternalNode>,
    pub edges: Vec<ExternalEdge>,
    pub entry_node_id: String,
    #[serde(default)]
    pub exit_node_ids: Vec<String>,
    /// Edges into the exit nodes, delivered separately by some backends.
    #[serde(default)]
    pub exit_edges: Vec<ExternalEdge>,
    #[serde(default)]
    pub diagnostics: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalNode {
    pub id: String,
    pub kind: String,
    pub title: String,
    /// Start/end source line, when the backend knows it.
    #[serde(default)]
    pub range: Option<(usize, usize)>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalEdge {
    pub id: String,
    pub from: String,
    pub to: String,
    pub kind: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdaptOutcome {
    pub graph: FlowGraph,
    /// Backend diagnostics, passed through unmodified.
    pub diagnostics: Vec<String>,
}

pub fn adapt(cfg: &ExternalCfg) -> AdaptOutcome {
    let mut kinds: HashMap<String, String> = HashMap::new();
    let mut excluded: HashSet<String> = HashSet::new();
    let mut nodes = vec![];
    for n in &cfg.nodes {
        if n.kind == "Module" {
            excluded.insert(n.id.clone());
            continue;
        }
        let shape = if cfg.exit_node_ids.contains(&n.id) {
            Shape::StartEnd
        } else {
            shape_for_kind(&n.kind)
        };
        kinds.insert(n.id.clone(), n.kind.clone());
        nodes.push(Node {
            id: n.id.clone(),
            shape,
            title: n.title.clone(),
            source_line: n.range.map(|(start, _)| start),
            x: 0.0,
            y: 0.0,
        });
    }

    let mut edges = vec![];
    for e in cfg.edges.iter().chain(&cfg.exit_edges) {
        if excluded.contains(&e.from) || excluded.contains(&e.to) {
            continue;
        }
        edges.push(Edge {
            id: e.id.clone(),
            from: e.from.clone(),
            to: e.to.clone(),
            label: label_of(e),
        });
    }

    let mut graph = FlowGraph { nodes, edges };
    let mut ids = alloc_past_used(&graph);

    // A backend entry that is a plain statement still needs the start marker
    // the structurer and the renderer look for.
    let entry_is_start = graph
        .node(&cfg.entry_node_id)
        .is_some_and(|n| n.shape == Shape::StartEnd);
    if !entry_is_start && graph.node(&cfg.entry_node_id).is_some() {
        let start = Node {
            id: ids.node(),
            shape: Shape::StartEnd,
            title: "开始".to_string(),
            source_line: None,
            x: 0.0,
            y: 0.0,
        };
        let edge = Edge {
            id: ids.edge(),
            from: start.id.clone(),
            to: cfg.entry_node_id.clone(),
            label: None,
        };
        graph.nodes.insert(0, start);
        graph.edges.insert(0, edge);
    }

    let graph = flatten_decision_chains(graph, &kinds, &mut ids);
    AdaptOutcome {
        graph: normalize_joins(graph),
        diagnostics: cfg.diagnostics.clone(),
    }
}

fn shape_for_kind(kind: &str) -> Shape {
    match kind {
        "If" | "Elif" | "While" | "For" | "Foreach" => Shape::Decision,
        "Function" | "FunctionEnd" | "ModuleEnd" => Shape::StartEnd,
        _ => Shape::Process,
    }
}

/// Yes/no from the explicit label when present, else from a true/false edge
/// kind. Anything else stays unlabeled.
fn label_of(e: &ExternalEdge) -> Option<EdgeLabel> {
    let word = e.label.as_deref().unwrap_or(&e.kind);
    match word.to_ascii_lowercase().as_str() {
        "yes" | "true" => Some(EdgeLabel::Yes),
        "no" | "false" => Some(EdgeLabel::No),
        _ => None,
    }
}

/// Fresh-id allocator positioned past every `n<k>`/`e<k>`/`__join__<k>` id
/// the backend (or a previous adaptation) already used.
fn alloc_past_used(graph: &FlowGraph) -> IdAlloc {
    let numbered = |id: &str| {
        ["__join__", "n", "e"]
            .iter()
            .find_map(|p| id.strip_prefix(p))
            .and_then(|rest| rest.parse::<usize>().ok())
    };
    let max = graph
        .nodes
        .iter()
        .map(|n| n.id.as_str())
        .chain(graph.edges.iter().map(|e| e.id.as_str()))
        .filter_map(numbered)
        .max();
    IdAlloc::starting_at(max.map_or(0, |m| m + 1))
}

/// One `if/elif/.../else` chain of decision nodes, linked by "no" edges.
struct Chain {
    members: Vec<String>,
    /// First node of each branch: every member's "yes" target plus the last
    /// member's "no" target.
    heads: Vec<String>,
}

/// Rewrites every maximal decision chain so all of its branches converge on a
/// single synthetic connector in front of the chain's merge node. A chain
/// whose merge already is a connector is left alone, which makes the pass
/// idempotent.
fn flatten_decision_chains(
    mut graph: FlowGraph,
    kinds: &HashMap<String, String>,
    ids: &mut IdAlloc,
) -> FlowGraph {
    loop {
        let adj = Adjacency::new(&graph);
        let Some((chain, merge)) = next_chain_to_flatten(&graph, kinds, &adj) else {
            return graph;
        };
        let mut sources: HashSet<String> = chain.members.iter().cloned().collect();
        for head in &chain.heads {
            if let Some(ix) = adj.index(head) {
                for r in adj.reachable(ix) {
                    sources.insert(graph.nodes[adj.node_pos(r)].id.clone());
                }
            }
        }
        let join = ids.join();
        for edge in &mut graph.edges {
            if edge.to == merge && sources.contains(&edge.from) {
                edge.to = join.clone();
            }
        }
        graph.nodes.push(Node {
            id: join.clone(),
            shape: Shape::Connector,
            title: String::new(),
            source_line: None,
            x: 0.0,
            y: 0.0,
        });
        graph.edges.push(Edge {
            id: ids.edge(),
            from: join,
            to: merge,
            label: None,
        });
    }
}

/// First chain, in node order, whose merge is not yet a connector.
fn next_chain_to_flatten(
    graph: &FlowGraph,
    kinds: &HashMap<String, String>,
    adj: &Adjacency,
) -> Option<(Chain, String)> {
    for node in &graph.nodes {
        if node.shape != Shape::Decision || kinds.get(&node.id).map(String::as_str) != Some("If") {
            continue;
        }
        let Some(chain) = collect_chain(graph, kinds, &node.id) else {
            continue;
        };
        let Some(merge) = chain_merge(graph, adj, &chain) else {
            continue;
        };
        let already = graph
            .node(&merge)
            .is_some_and(|n| n.shape == Shape::Connector);
        if !already {
            return Some((chain, merge));
        }
    }
    None
}

fn collect_chain(graph: &FlowGraph, kinds: &HashMap<String, String>, first: &str) -> Option<Chain> {
    let mut members = vec![first.to_string()];
    let mut heads = vec![];
    loop {
        let cur = members.last().unwrap();
        let yes = branch_target(graph, cur, EdgeLabel::Yes)?;
        let no = branch_target(graph, cur, EdgeLabel::No)?;
        heads.push(yes);
        let continues = graph.node(&no).is_some_and(|n| n.shape == Shape::Decision)
            && kinds.get(&no).map(String::as_str) == Some("Elif");
        if continues {
            members.push(no);
        } else {
            heads.push(no);
            break;
        }
    }
    // A lone `if` is not a chain; the generalized merge rewrite is only
    // needed once elif arms multiply the branches.
    (members.len() >= 2).then_some(Chain { members, heads })
}

fn branch_target(graph: &FlowGraph, from: &str, label: EdgeLabel) -> Option<String> {
    let mut targets = graph
        .out_edges(from)
        .filter(|e| e.label == Some(label))
        .map(|e| e.to.clone());
    let target = targets.next();
    // Two same-labeled branches means the backend graph is malformed;
    // flattening such a chain would guess, so it is skipped.
    targets.next().is_none().then_some(target).flatten()
}

/// Merge of a chain: the node reachable from every branch head, other than
/// the chain itself, with in-degree ≥ 2, minimizing the largest BFS distance
/// from any head; ties broken by id.
fn chain_merge(graph: &FlowGraph, adj: &Adjacency, chain: &Chain) -> Option<String> {
    let dist_maps: Vec<_> = chain
        .heads
        .iter()
        .map(|h| adj.index(h).map(|ix| adj.distances(ix)))
        .collect::<Option<Vec<_>>>()?;
    let mut best: Option<(usize, &str)> = None;
    for node in &graph.nodes {
        if chain.members.contains(&node.id) {
            continue;
        }
        let ix = adj.index(&node.id)?;
        let Some(worst) = dist_maps
            .iter()
            .map(|d| d.get(&ix).copied())
            .collect::<Option<Vec<_>>>()
            .map(|ds| ds.into_iter().max().unwrap_or(0))
        else {
            continue;
        };
        if adj.in_degree(ix) < 2 {
            continue;
        }
        let key = (worst, node.id.as_str());
        if best.is_none_or(|b| key < b) {
            best = Some(key);
        }
    }
    best.map(|(_, id)| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ext_node(id: &str, kind: &str, title: &str) -> ExternalNode {
        ExternalNode {
            id: id.to_string(),
            kind: kind.to_string(),
            title: title.to_string(),
            range: None,
        }
    }

    fn ext_edge(id: &str, from: &str, to: &str, kind: &str) -> ExternalEdge {
        ExternalEdge {
            id: id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            kind: kind.to_string(),
            label: None,
        }
    }

    /// if / elif / else over three assignments, all meeting at a print.
    fn chain_cfg() -> ExternalCfg {
        ExternalCfg {
            nodes: vec![
                ext_node("f", "Function", "main"),
                ext_node("d1", "If", "x > 0"),
                ext_node("d2", "Elif", "x < 0"),
                ext_node("a1", "Assign", "a = 1"),
                ext_node("a2", "Assign", "a = 2"),
                ext_node("a3", "Assign", "a = 3"),
                ext_node("p", "Call", "print(a)"),
                ext_node("fe", "FunctionEnd", ""),
            ],
            edges: vec![
                ext_edge("c0", "f", "d1", "Next"),
                ext_edge("c1", "d1", "a1", "True"),
                ext_edge("c2", "d1", "d2", "False"),
                ext_edge("c3", "d2", "a2", "True"),
                ext_edge("c4", "d2", "a3", "False"),
                ext_edge("c5", "a1", "p", "Next"),
                ext_edge("c6", "a2", "p", "Next"),
                ext_edge("c7", "a3", "p", "Next"),
                ext_edge("c8", "p", "fe", "Next"),
            ],
            entry_node_id: "f".to_string(),
            exit_node_ids: vec!["fe".to_string()],
            exit_edges: vec![],
            diagnostics: vec!["后端提示：x 可能未定义".to_string()],
        }
    }

    #[test]
    fn test_kind_mapping_and_module_exclusion() {
        let cfg = ExternalCfg {
            nodes: vec![
                ext_node("m", "Module", "mod"),
                ext_node("w", "While", "i < n"),
                ext_node("s", "Assign", "i = 0"),
            ],
            edges: vec![
                ext_edge("c0", "m", "s", "Next"),
                ext_edge("c1", "s", "w", "Next"),
            ],
            entry_node_id: "s".to_string(),
            exit_node_ids: vec![],
            exit_edges: vec![],
            diagnostics: vec![],
        };
        let out = adapt(&cfg);
        assert!(out.graph.node("m").is_none());
        assert!(out.graph.edges.iter().all(|e| e.from != "m" && e.to != "m"));
        assert_eq!(out.graph.node("w").unwrap().shape, Shape::Decision);
        assert_eq!(out.graph.node("s").unwrap().shape, Shape::Process);
    }

    #[test]
    fn test_synthetic_start_for_plain_entry() {
        let cfg = ExternalCfg {
            nodes: vec![ext_node("s", "Assign", "a = 1")],
            edges: vec![],
            entry_node_id: "s".to_string(),
            exit_node_ids: vec![],
            exit_edges: vec![],
            diagnostics: vec![],
        };
        let out = adapt(&cfg);
        let start = &out.graph.nodes[0];
        assert_eq!(start.shape, Shape::StartEnd);
        assert!(out
            .graph
            .edges
            .iter()
            .any(|e| e.from == start.id && e.to == "s"));
    }

    #[test]
    fn test_chain_collapses_onto_one_connector() {
        let out = adapt(&chain_cfg());
        let connectors: Vec<_> = out
            .graph
            .nodes
            .iter()
            .filter(|n| n.shape == Shape::Connector)
            .collect();
        assert_eq!(connectors.len(), 1);
        let join = &connectors[0].id;
        assert_eq!(out.graph.in_degree(join), 3);
        assert_eq!(out.graph.out_edges(join).count(), 1);
        assert_eq!(out.graph.out_edges(join).next().unwrap().to, "p");
        assert_eq!(out.graph.in_degree("p"), 1);
    }

    #[test]
    fn test_true_false_kinds_become_labels() {
        let out = adapt(&chain_cfg());
        let yes = out.graph.edges.iter().find(|e| e.id == "c1").unwrap();
        let no = out.graph.edges.iter().find(|e| e.id == "c2").unwrap();
        assert_eq!(yes.label, Some(EdgeLabel::Yes));
        assert_eq!(no.label, Some(EdgeLabel::No));
    }

    #[test]
    fn test_chain_flattening_is_idempotent() {
        let once = adapt(&chain_cfg()).graph;
        let kinds = HashMap::from([
            ("d1".to_string(), "If".to_string()),
            ("d2".to_string(), "Elif".to_string()),
        ]);
        let mut ids = alloc_past_used(&once);
        let twice = normalize_joins(flatten_decision_chains(once.clone(), &kinds, &mut ids));
        assert_eq!(once.nodes.len(), twice.nodes.len());
        assert_eq!(once.edges.len(), twice.edges.len());
    }

    #[test]
    fn test_diagnostics_pass_through() {
        let out = adapt(&chain_cfg());
        assert_eq!(out.diagnostics, chain_cfg().diagnostics);
    }

    #[test]
    fn test_adapted_chain_structures_back_to_elif() {
        use crate::graph::structure::structure;
        use crate::ir::{ElseArm, Node as IrNode};

        let out = structure(&adapt(&chain_cfg()).graph);
        assert!(out.structured);
        let IrNode::If(f) = &out.ir.0[0] else {
            panic!("expected if, got {:?}", out.ir.0[0]);
        };
        assert_eq!(f.cond, "x > 0");
        assert!(matches!(&f.else_arm, ElseArm::Elif(inner) if inner.cond == "x < 0"));
    }
}
