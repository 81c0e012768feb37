//! IR → lite-source emitter with the node→line map that keeps breakpoints
//! and highlighting aligned between the two views.

use std::collections::BTreeMap;

use crate::ir::{Block, ElseArm, For, Func, If, Node, While};

#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub text: String,
    /// Flow-node id → 1-based line in `text`. Recomputed on every pass.
    pub line_map: BTreeMap<String, usize>,
}

#[must_use]
pub fn generate(block: &Block) -> Generated {
    let mut emitter = Emitter::default();
    emitter.emit_block(block, 0);
    Generated {
        text: emitter.lines.join("\n"),
        line_map: emitter.line_map,
    }
}

#[derive(Debug, Default)]
struct Emitter {
    lines: Vec<String>,
    line_map: BTreeMap<String, usize>,
}

impl Emitter {
    fn emit(&mut self, depth: usize, text: &str, source: Option<&String>) {
        self.lines.push(format!("{}{}", "  ".repeat(depth), text));
        if let Some(id) = source {
            self.line_map.insert(id.clone(), self.lines.len());
        }
    }

    fn emit_block(&mut self, block: &Block, depth: usize) {
        if block.is_empty() {
            self.emit(depth, "pass", None);
            return;
        }
        for node in block.nodes() {
            match node {
                Node::Stmt(s) => self.emit(depth, &s.text, s.source.as_ref()),
                Node::If(f) => self.emit_if(f, depth, "if"),
                Node::While(w) => self.emit_while(w, depth),
                Node::For(f) => self.emit_for(f, depth),
                Node::Func(f) => self.emit_func(f, depth),
            }
        }
    }

    fn emit_if(&mut self, f: &If, depth: usize, keyword: &str) {
        self.emit(depth, &format!("{keyword} {}:", f.cond), f.decision.as_ref());
        self.emit_block(&f.then_block, depth + 1);
        match &f.else_arm {
            ElseArm::None => {}
            ElseArm::Elif(inner) => self.emit_if(inner, depth, "elif"),
            ElseArm::Block(block) if block.is_empty() => {}
            ElseArm::Block(block) => {
                self.emit(depth, "else:", None);
                self.emit_block(block, depth + 1);
            }
        }
    }

    fn emit_while(&mut self, w: &While, depth: usize) {
        self.emit(depth, &format!("while {}:", w.cond), w.decision.as_ref());
        self.emit_block(&w.body, depth + 1);
    }

    fn emit_for(&mut self, f: &For, depth: usize) {
        let range = if f.step == 1 && f.start == "0" {
            format!("range({})", f.end)
        } else if f.step == 1 {
            format!("range({}, {})", f.start, f.end)
        } else {
            format!("range({}, {}, {})", f.start, f.end, f.step)
        };
        self.emit(depth, &format!("for {} in {range}:", f.var), None);
        self.emit_block(&f.body, depth + 1);
    }

    fn emit_func(&mut self, f: &Func, depth: usize) {
        self.emit(depth, &format!("def {}({}):", f.name, f.params), None);
        self.emit_block(&f.body, depth + 1);
    }
}
