//! Intermediate representation shared by every translation pass.
//!
//! A [`Block`] is an ordered sequence of nodes; insertion order is execution
//! order. Trees are immutable values: passes consume or borrow a block and
//! produce a fresh one, they never patch nodes in place.

/// An ordered sequence of IR nodes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block(pub Vec<Node>);

impl Block {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self(nodes)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Stmt(Stmt),
    If(If),
    While(While),
    For(For),
    Func(Func),
}

/// An opaque statement: assignment, call, I/O, `return`, `pass`.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub text: String,
    /// Id of the flow node this statement was recovered from, when the IR
    /// came out of a graph.
    pub source: Option<String>,
    /// 1-based source line, when the IR came out of text.
    pub line: Option<usize>,
}

impl Stmt {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: None,
            line: None,
        }
    }

    pub fn from_node(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: Some(source.into()),
            line: None,
        }
    }

    /// `return` statements are true terminals: no outgoing control flow.
    pub fn is_return(&self) -> bool {
        let t = self.text.trim_start();
        t == "return" || t.starts_with("return ") || t.starts_with("return(")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct If {
    pub cond: String,
    pub then_block: Block,
    pub else_arm: ElseArm,
    pub decision: Option<String>,
    pub join: Option<String>,
    pub line: Option<usize>,
}

/// The `else` side of an [`If`]. An `elif` chain is a nested `If` tagged as
/// [`ElseArm::Elif`]; all members of one chain share a single join node in
/// the flow graph.
#[derive(Debug, Clone, PartialEq)]
pub enum ElseArm {
    None,
    Elif(Box<If>),
    Block(Block),
}

impl ElseArm {
    pub fn is_none(&self) -> bool {
        matches!(self, ElseArm::None)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct While {
    pub cond: String,
    pub body: Block,
    pub decision: Option<String>,
    /// Id of the edge that closes the loop, when recovered from a graph.
    pub back_edge: Option<String>,
    pub line: Option<usize>,
}

/// A counted loop over `range(start, end, step)`; `end` is exclusive.
/// Produced by the parser's `range` form or by for-loop induction, never by
/// the structurer directly.
#[derive(Debug, Clone, PartialEq)]
pub struct For {
    pub var: String,
    pub start: String,
    pub end: String,
    pub step: i64,
    pub body: Block,
    pub line: Option<usize>,
}

/// A one-level function definition wrapping its body.
#[derive(Debug, Clone, PartialEq)]
pub struct Func {
    pub name: String,
    pub params: String,
    pub body: Block,
    pub line: Option<usize>,
}
