//! IR → flow-graph builder.
//!
//! Every construct contributes its nodes and returns its entry plus the set
//! of dangling exits; consecutive constructs are chained by wiring exits to
//! the next entry. A loop's exit carries the decision's "no" label with it,
//! so the loop is never double-wired.

use super::{Edge, EdgeLabel, FlowGraph, IdAlloc, Node, Shape, normalize_joins};
use crate::ir::{self, Block, ElseArm};
use crate::parser::grammar;

const IO_PRIMITIVES: &[&str] = &["print", "input"];

/// Builds a fresh flow graph for the whole IR tree: a start node wired to
/// the entry, an end node wired to every non-returning exit. A program that
/// is a single function definition is charted as that function's body.
#[must_use]
pub fn build(ir: &Block) -> FlowGraph {
    let mut b = Builder::default();
    let start = b.push(Shape::StartEnd, "开始", None);
    let body = match ir.nodes() {
        [ir::Node::Func(f)] => &f.body,
        _ => ir,
    };
    let built = b.build_block(body);
    if let Some(entry) = &built.entry {
        b.edge(&start, entry, None);
    }
    let end = b.push(Shape::StartEnd, "结束", None);
    if built.entry.is_none() {
        b.edge(&start, &end, None);
    }
    b.wire(&built.exits, &end, None);
    normalize_joins(FlowGraph {
        nodes: b.nodes,
        edges: b.edges,
    })
}

#[derive(Debug, Default)]
struct Builder {
    ids: IdAlloc,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

#[derive(Debug, Clone)]
struct Exit {
    node: String,
    label: Option<EdgeLabel>,
}

#[derive(Debug, Default)]
struct Built {
    entry: Option<String>,
    exits: Vec<Exit>,
}

impl Builder {
    fn push(&mut self, shape: Shape, title: impl Into<String>, line: Option<usize>) -> String {
        let id = self.ids.node();
        self.nodes.push(Node {
            id: id.clone(),
            shape,
            title: title.into(),
            source_line: line,
            x: 0.0,
            y: 0.0,
        });
        id
    }

    fn edge(&mut self, from: &str, to: &str, label: Option<EdgeLabel>) {
        self.edges.push(Edge {
            id: self.ids.edge(),
            from: from.to_string(),
            to: to.to_string(),
            label,
        });
    }

    /// An exit's own label wins over the default the successor suggests.
    fn wire(&mut self, exits: &[Exit], to: &str, default: Option<EdgeLabel>) {
        for exit in exits {
            self.edge(&exit.node, to, exit.label.or(default));
        }
    }

    fn build_block(&mut self, block: &Block) -> Built {
        let mut entry = None;
        let mut prev: Vec<Exit> = vec![];
        for node in block.nodes() {
            let built = self.build_node(node);
            let Some(node_entry) = built.entry else {
                continue;
            };
            if entry.is_none() {
                entry = Some(node_entry);
            } else {
                self.wire(&prev, &node_entry, None);
            }
            prev = built.exits;
        }
        Built { entry, exits: prev }
    }

    fn build_node(&mut self, node: &ir::Node) -> Built {
        match node {
            ir::Node::Stmt(s) => {
                let id = self.push(shape_of(&s.text), &s.text, s.line);
                let exits = if s.is_return() {
                    vec![]
                } else {
                    vec![Exit {
                        node: id.clone(),
                        label: None,
                    }]
                };
                Built {
                    entry: Some(id),
                    exits,
                }
            }
            ir::Node::If(f) => self.build_if(f, None),
            ir::Node::While(w) => self.build_while(w),
            ir::Node::For(f) => self.build_for(f),
            ir::Node::Func(f) => self.build_block(&f.body),
        }
    }

    /// `shared_join` carries the join id down an elif chain: every branch of
    /// the chain converges on the one join allocated by the outermost `if`,
    /// never on nested intermediate joins.
    fn build_if(&mut self, f: &ir::If, shared_join: Option<String>) -> Built {
        let decision = self.push(Shape::Decision, &f.cond, f.line);
        let owned = shared_join.is_none();
        let join = shared_join.unwrap_or_else(|| self.ids.join());

        let then_built = self.build_block(&f.then_block);
        match &then_built.entry {
            Some(entry) => {
                self.edge(&decision, entry, Some(EdgeLabel::Yes));
                self.wire(&then_built.exits, &join, None);
            }
            None => self.edge(&decision, &join, Some(EdgeLabel::Yes)),
        }

        match &f.else_arm {
            ElseArm::None => self.edge(&decision, &join, Some(EdgeLabel::No)),
            ElseArm::Elif(inner) => {
                let inner_built = self.build_if(inner, Some(join.clone()));
                if let Some(entry) = &inner_built.entry {
                    self.edge(&decision, entry, Some(EdgeLabel::No));
                }
            }
            ElseArm::Block(block) => {
                let else_built = self.build_block(block);
                match &else_built.entry {
                    Some(entry) => {
                        self.edge(&decision, entry, Some(EdgeLabel::No));
                        self.wire(&else_built.exits, &join, None);
                    }
                    None => self.edge(&decision, &join, Some(EdgeLabel::No)),
                }
            }
        }

        if owned {
            self.nodes.push(Node {
                id: join.clone(),
                shape: Shape::Connector,
                title: String::new(),
                source_line: None,
                x: 0.0,
                y: 0.0,
            });
            Built {
                entry: Some(decision),
                exits: vec![Exit {
                    node: join,
                    label: None,
                }],
            }
        } else {
            Built {
                entry: Some(decision),
                exits: vec![],
            }
        }
    }

    fn build_while(&mut self, w: &ir::While) -> Built {
        let decision = self.push(Shape::Decision, &w.cond, w.line);
        let body = self.build_block(&w.body);
        match &body.entry {
            Some(entry) => {
                self.edge(&decision, entry, Some(EdgeLabel::Yes));
                self.wire(&body.exits, &decision, Some(EdgeLabel::Yes));
            }
            None => self.edge(&decision, &decision, Some(EdgeLabel::Yes)),
        }
        Built {
            entry: Some(decision.clone()),
            exits: vec![Exit {
                node: decision,
                label: Some(EdgeLabel::No),
            }],
        }
    }

    /// Counted loop: explicit init, bound test (direction from the step's
    /// sign), body, explicit step, back-edge from the step to the test.
    fn build_for(&mut self, f: &ir::For) -> Built {
        let init = self.push(Shape::Process, format!("{} = {}", f.var, f.start), f.line);
        let cmp = if f.step > 0 { "<" } else { ">" };
        let decision = self.push(Shape::Decision, format!("{} {cmp} {}", f.var, f.end), f.line);
        self.edge(&init, &decision, None);
        let body = self.build_block(&f.body);
        let step_text = if f.step > 0 {
            format!("{} += {}", f.var, f.step)
        } else {
            format!("{} -= {}", f.var, -f.step)
        };
        let step = self.push(Shape::Process, step_text, None);
        match &body.entry {
            Some(entry) => {
                self.edge(&decision, entry, Some(EdgeLabel::Yes));
                self.wire(&body.exits, &step, None);
            }
            None => self.edge(&decision, &step, Some(EdgeLabel::Yes)),
        }
        self.edge(&step, &decision, Some(EdgeLabel::Yes));
        Built {
            entry: Some(init),
            exits: vec![Exit {
                node: decision,
                label: Some(EdgeLabel::No),
            }],
        }
    }
}

fn shape_of(text: &str) -> Shape {
    let t = text.trim();
    if t == "pass" || t.starts_with("return") {
        return Shape::Process;
    }
    match grammar::call_target(t) {
        Some(callee) if IO_PRIMITIVES.contains(&callee.as_str()) => Shape::Io,
        Some(_) => Shape::Subroutine,
        None => Shape::Process,
    }
}
