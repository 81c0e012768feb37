//! Flow-graph → IR structurer.
//!
//! Recovers structured code from an arbitrary, possibly hand-edited graph:
//! loops from forward paths leading back to a decision, if/else merges from
//! BFS distance maps. Graphs that defeat recovery degrade to a linear walk
//! with diagnostics explaining why, they never crash the translation.

use std::collections::{HashMap, HashSet};

use petgraph::graph::NodeIndex;

use super::analysis::Adjacency;
use super::{EdgeLabel, FlowGraph, Node, Shape};
use crate::error::Warning;
use crate::ir::{self, Block, ElseArm};

/// Revisits allowed per node before a sub-block is declared unstructurable.
/// Bounds recursion on malformed or cyclic graphs.
const REVISIT_CAP: u32 = 3;

/// Cap on reported reasons when the linear fallback is taken.
const MAX_REASONS: usize = 6;

#[derive(Debug)]
pub struct StructureOutcome {
    pub ir: Block,
    pub warnings: Vec<Warning>,
    /// False when `ir` is the degraded linear walk.
    pub structured: bool,
}

pub fn structure(flow: &FlowGraph) -> StructureOutcome {
    let adj = Adjacency::new(flow);
    let Some(start) = start_index(flow, &adj) else {
        return fallback(flow, &adj);
    };
    let mut s = Structurer {
        flow,
        adj: &adj,
        visits: HashMap::new(),
    };
    match s.parse_block(start, &HashSet::new()) {
        Some(block) => StructureOutcome {
            ir: block,
            warnings: vec![],
            structured: true,
        },
        None => fallback(flow, &adj),
    }
}

/// Start node: `start_end` shape with a start-ish title, else the first node.
fn find_start(flow: &FlowGraph) -> Option<usize> {
    if flow.nodes.is_empty() {
        return None;
    }
    flow.nodes
        .iter()
        .position(|n| n.shape == Shape::StartEnd && title_is_start(&n.title))
        .or(Some(0))
}

fn start_index(flow: &FlowGraph, adj: &Adjacency) -> Option<NodeIndex> {
    find_start(flow).and_then(|pos| adj.index(&flow.nodes[pos].id))
}

fn title_is_start(title: &str) -> bool {
    title.contains("开始") || title.to_lowercase().contains("start")
}

struct Structurer<'a> {
    flow: &'a FlowGraph,
    adj: &'a Adjacency,
    visits: HashMap<NodeIndex, u32>,
}

impl Structurer<'_> {
    fn node(&self, ix: NodeIndex) -> &Node {
        &self.flow.nodes[self.adj.node_pos(ix)]
    }

    fn parse_block(&mut self, at: NodeIndex, stop: &HashSet<NodeIndex>) -> Option<Block> {
        let mut nodes = vec![];
        let mut cur = Some(at);
        while let Some(ix) = cur {
            if stop.contains(&ix) {
                break;
            }
            let count = self.visits.entry(ix).or_insert(0);
            *count += 1;
            if *count > REVISIT_CAP {
                log::debug!("revisit cap hit at node {}", self.node(ix).id);
                return None;
            }
            match self.node(ix).shape {
                Shape::Decision => {
                    let (parsed, next) = self.parse_decision(ix, stop)?;
                    nodes.push(parsed);
                    cur = next;
                }
                // Entry/exit markers and joins contribute no statements.
                Shape::StartEnd | Shape::Connector => {
                    cur = self.follow_single(ix)?;
                }
                _ => {
                    let node = self.node(ix);
                    nodes.push(ir::Node::Stmt(ir::Stmt {
                        text: node.title.clone(),
                        source: Some(node.id.clone()),
                        line: node.source_line,
                    }));
                    cur = self.follow_single(ix)?;
                }
            }
        }
        Some(Block::new(nodes))
    }

    /// One outgoing edge continues the block, none ends it, anything else is
    /// a structuring failure.
    fn follow_single(&self, ix: NodeIndex) -> Option<Option<NodeIndex>> {
        let outs = self.adj.out_edge_indices(ix);
        match outs.as_slice() {
            [] => Some(None),
            [e] => self.adj.edge_target(*e).map(Some),
            _ => None,
        }
    }

    fn parse_decision(
        &mut self,
        ix: NodeIndex,
        stop: &HashSet<NodeIndex>,
    ) -> Option<(ir::Node, Option<NodeIndex>)> {
        let (id, title, line) = {
            let node = self.node(ix);
            (node.id.clone(), node.title.clone(), node.source_line)
        };
        let (yes_edge, no_edge) = self.pick_branches(ix)?;
        let yes_t = self.adj.edge_target(yes_edge)?;
        let no_t = self.adj.edge_target(no_edge)?;

        // Loop probe: a forward path from a branch target back to this
        // decision makes that branch the loop body. The probe must stay
        // inside the current region, so stop nodes are off limits.
        for (body_t, exit_t, body_is_yes) in [(yes_t, no_t, true), (no_t, yes_t, false)] {
            let Some(path) = self.adj.path_avoiding(body_t, ix, stop) else {
                continue;
            };
            let closing = if path.len() >= 2 {
                self.adj.connecting_edge(path[path.len() - 2], ix)
            } else {
                self.adj.connecting_edge(ix, ix)
            };
            let closing = closing?;
            let mut body_stop = HashSet::new();
            body_stop.insert(ix);
            body_stop.insert(exit_t);
            let body = self.parse_block(body_t, &body_stop)?;
            let cond = if body_is_yes {
                title.clone()
            } else {
                format!("not ({title})")
            };
            let parsed = ir::Node::While(ir::While {
                cond,
                body,
                decision: Some(id.clone()),
                back_edge: Some(self.flow.edges[closing].id.clone()),
                line,
            });
            return Some((parsed, Some(exit_t)));
        }

        // Branch merge: the node reachable from both targets minimizing
        // dist_yes + dist_no, ties by smaller maximum, then by id.
        let dist_yes = self.adj.distances(yes_t);
        let dist_no = self.adj.distances(no_t);
        let mut best: Option<(usize, usize, String, NodeIndex)> = None;
        for (&cand, &d1) in &dist_yes {
            if cand == ix {
                continue;
            }
            let Some(&d2) = dist_no.get(&cand) else {
                continue;
            };
            let key = (d1 + d2, d1.max(d2), self.node(cand).id.clone(), cand);
            if best.as_ref().is_none_or(|b| (key.0, key.1, &key.2) < (b.0, b.1, &b.2)) {
                best = Some(key);
            }
        }
        let (_, _, join_id, join_ix) = best?;
        let mut branch_stop = stop.clone();
        branch_stop.insert(join_ix);
        let then_block = self.parse_block(yes_t, &branch_stop)?;
        let else_block = self.parse_block(no_t, &branch_stop)?;
        let else_arm = if else_block.is_empty() {
            ElseArm::None
        } else if else_block.0.len() == 1 && matches!(else_block.0[0], ir::Node::If(_)) {
            // A single nested if in the else arm reads as `elif`.
            let Some(ir::Node::If(inner)) = else_block.0.into_iter().next() else {
                unreachable!()
            };
            ElseArm::Elif(Box::new(inner))
        } else {
            ElseArm::Block(else_block)
        };
        let parsed = ir::Node::If(ir::If {
            cond: title,
            then_block,
            else_arm,
            decision: Some(id),
            join: Some(join_id),
            line,
        });
        Some((parsed, Some(join_ix)))
    }

    /// Yes/no branch selection: labels when they disambiguate, otherwise the
    /// positional convention that the lower-right-ish target is "no".
    fn pick_branches(&self, ix: NodeIndex) -> Option<(usize, usize)> {
        use EdgeLabel::{No, Yes};
        let outs = self.adj.out_edge_indices(ix);
        let [a, b] = outs.as_slice() else {
            return None;
        };
        let (a, b) = (*a, *b);
        match (self.flow.edges[a].label, self.flow.edges[b].label) {
            (Some(Yes), Some(No)) | (Some(Yes), None) | (None, Some(No)) => Some((a, b)),
            (Some(No), Some(Yes)) | (None, Some(Yes)) | (Some(No), None) => Some((b, a)),
            _ => {
                let decision = self.node(ix);
                let ta = self.node(self.adj.edge_target(a)?);
                let tb = self.node(self.adj.edge_target(b)?);
                let score =
                    |t: &Node| (t.y - decision.y) * 2.0 + (t.x - decision.x);
                if score(tb) >= score(ta) {
                    Some((a, b))
                } else {
                    Some((b, a))
                }
            }
        }
    }
}

fn fallback(flow: &FlowGraph, adj: &Adjacency) -> StructureOutcome {
    log::debug!("structuring failed, taking linear fallback");
    let mut warnings = vec![Warning::structure(
        "流程图无法还原为结构化代码，已按执行顺序线性展开",
    )];
    warnings.extend(diagnose(flow));
    StructureOutcome {
        ir: linear(flow, adj),
        warnings,
        structured: false,
    }
}

/// Total linear walk: follow the single outgoing edge (the "yes" edge at
/// decisions) from the start until a node repeats or none remain.
fn linear(flow: &FlowGraph, adj: &Adjacency) -> Block {
    let mut out = vec![];
    let mut seen = HashSet::new();
    let mut cur = start_index(flow, adj);
    while let Some(ix) = cur {
        if !seen.insert(ix) {
            break;
        }
        let node = &flow.nodes[adj.node_pos(ix)];
        if node.shape != Shape::StartEnd && node.shape != Shape::Connector {
            out.push(ir::Node::Stmt(ir::Stmt {
                text: node.title.clone(),
                source: Some(node.id.clone()),
                line: node.source_line,
            }));
        }
        let outs = adj.out_edge_indices(ix);
        let next = if node.shape == Shape::Decision {
            outs.iter()
                .copied()
                .find(|&e| flow.edges[e].label == Some(EdgeLabel::Yes))
                .or_else(|| outs.first().copied())
        } else {
            outs.first().copied()
        };
        cur = next.and_then(|e| adj.edge_target(e));
    }
    Block::new(out)
}

/// Why the graph was not structurable, for the user. Independent of the
/// recursive parse so the reasons stay stable.
fn diagnose(flow: &FlowGraph) -> Vec<Warning> {
    let mut reasons = vec![];
    if flow.nodes.is_empty() {
        reasons.push("流程图中没有任何节点".to_string());
        return wrap(reasons);
    }
    if !flow.nodes.iter().any(|n| n.shape == Shape::StartEnd) {
        reasons.push("找不到开始节点".to_string());
    }
    if flow.edges.is_empty() && flow.nodes.len() > 1 {
        reasons.push("流程图中没有任何连线".to_string());
    }
    for node in &flow.nodes {
        let outs: Vec<_> = flow.out_edges(&node.id).collect();
        match node.shape {
            Shape::Decision => {
                if outs.len() != 2 {
                    reasons.push(format!(
                        "判断节点「{}」有 {} 条出边（应为 2）",
                        node.title,
                        outs.len()
                    ));
                } else {
                    let yes = outs.iter().filter(|e| e.label == Some(EdgeLabel::Yes)).count();
                    let no = outs.iter().filter(|e| e.label == Some(EdgeLabel::No)).count();
                    if yes != 1 || no != 1 {
                        reasons.push(format!("判断节点「{}」缺少 是/否 分支标签", node.title));
                    }
                }
            }
            Shape::StartEnd => {}
            _ => {
                if outs.len() > 1 {
                    reasons.push(format!(
                        "节点「{}」有 {} 条出边（应为 1）",
                        node.title,
                        outs.len()
                    ));
                }
            }
        }
    }
    for edge in &flow.edges {
        if flow.node(&edge.from).is_none() || flow.node(&edge.to).is_none() {
            reasons.push(format!("连线 {} 指向不存在的节点", edge.id));
        }
    }
    wrap(reasons)
}

fn wrap(mut reasons: Vec<String>) -> Vec<Warning> {
    reasons.truncate(MAX_REASONS);
    reasons.into_iter().map(Warning::structure).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build::build;
    use crate::graph::Edge;
    use crate::parser;

    fn node(id: &str, shape: Shape, title: &str) -> Node {
        Node {
            id: id.to_string(),
            shape,
            title: title.to_string(),
            source_line: None,
            x: 0.0,
            y: 0.0,
        }
    }

    fn edge(id: &str, from: &str, to: &str, label: Option<EdgeLabel>) -> Edge {
        Edge {
            id: id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            label,
        }
    }

    /// if x>0: a=1 else: a=2, then a shared print(a).
    fn diamond() -> FlowGraph {
        FlowGraph {
            nodes: vec![
                node("start", Shape::StartEnd, "开始"),
                node("d", Shape::Decision, "x > 0"),
                node("a1", Shape::Process, "a = 1"),
                node("a2", Shape::Process, "a = 2"),
                node("p", Shape::Io, "print(a)"),
                node("end", Shape::StartEnd, "结束"),
            ],
            edges: vec![
                edge("e0", "start", "d", None),
                edge("e1", "d", "a1", Some(EdgeLabel::Yes)),
                edge("e2", "d", "a2", Some(EdgeLabel::No)),
                edge("e3", "a1", "p", None),
                edge("e4", "a2", "p", None),
                edge("e5", "p", "end", None),
            ],
        }
    }

    #[test]
    fn test_diamond_recovers_if_else() {
        let out = structure(&diamond());
        assert!(out.structured);
        assert!(out.warnings.is_empty());
        assert_eq!(out.ir.0.len(), 2);
        let ir::Node::If(f) = &out.ir.0[0] else {
            panic!("expected if, got {:?}", out.ir.0[0]);
        };
        assert_eq!(f.cond, "x > 0");
        assert_eq!(f.decision.as_deref(), Some("d"));
        assert_eq!(f.join.as_deref(), Some("p"));
        assert!(matches!(&f.else_arm, ElseArm::Block(b) if b.0.len() == 1));
        assert!(matches!(&out.ir.0[1], ir::Node::Stmt(s) if s.text == "print(a)"));
    }

    #[test]
    fn test_unlabeled_branches_use_positions() {
        let mut g = diamond();
        for e in &mut g.edges {
            e.label = None;
        }
        // a2 sits lower-right of the decision, so it becomes the "no" branch.
        g.nodes[2].x = -40.0;
        g.nodes[2].y = 40.0;
        g.nodes[3].x = 40.0;
        g.nodes[3].y = 40.0;
        let out = structure(&g);
        assert!(out.structured);
        let ir::Node::If(f) = &out.ir.0[0] else {
            panic!("expected if");
        };
        assert!(matches!(&f.then_block.0[0], ir::Node::Stmt(s) if s.text == "a = 1"));
    }

    #[test]
    fn test_loop_recovery_round_trip() {
        let src = "i = 0\nwhile i < 10:\n  print(i)\n  i += 1\nprint(i)";
        let g = build(&parser::parse(src).ir.unwrap());
        let out = structure(&g);
        assert!(out.structured);
        let ir::Node::While(w) = &out.ir.0[1] else {
            panic!("expected while, got {:?}", out.ir.0[1]);
        };
        assert_eq!(w.cond, "i < 10");
        assert!(w.back_edge.is_some());
        assert_eq!(w.body.0.len(), 2);
    }

    #[test]
    fn test_if_inside_loop_is_not_mistaken_for_a_loop() {
        let src = "i = 0\nwhile i < 10:\n  if i > 5:\n    print(i)\n  i += 1";
        let g = build(&parser::parse(src).ir.unwrap());
        let out = structure(&g);
        assert!(out.structured);
        let ir::Node::While(w) = &out.ir.0[1] else {
            panic!("expected while");
        };
        assert!(matches!(&w.body.0[0], ir::Node::If(_)));
    }

    #[test]
    fn test_elif_round_trip() {
        let src = "if x > 0:\n  a = 1\nelif x < 0:\n  a = 2\nelse:\n  a = 3\nprint(a)";
        let g = build(&parser::parse(src).ir.unwrap());
        let out = structure(&g);
        assert!(out.structured);
        let ir::Node::If(f) = &out.ir.0[0] else {
            panic!("expected if");
        };
        assert!(matches!(&f.else_arm, ElseArm::Elif(_)));
    }

    #[test]
    fn test_three_way_decision_falls_back() {
        let mut g = diamond();
        g.edges.push(edge("e6", "d", "p", None));
        let out = structure(&g);
        assert!(!out.structured);
        assert!(!out.ir.0.is_empty());
        assert!(out.warnings.len() >= 2);
        assert!(out.warnings.iter().any(|w| w.message.contains("出边")));
    }

    #[test]
    fn test_empty_graph_falls_back_with_reason() {
        let out = structure(&FlowGraph::default());
        assert!(!out.structured);
        assert!(out.ir.0.is_empty());
        assert!(!out.warnings.is_empty());
    }

    #[test]
    fn test_reasons_are_capped() {
        let mut g = FlowGraph::default();
        g.nodes.push(node("start", Shape::StartEnd, "开始"));
        for i in 0..10 {
            g.nodes.push(node(&format!("d{i}"), Shape::Decision, "x"));
        }
        g.edges.push(edge("e0", "start", "d0", None));
        let out = structure(&g);
        assert!(!out.structured);
        // One lead warning plus at most six reasons.
        assert_eq!(out.warnings.len(), MAX_REASONS + 1);
    }
}
