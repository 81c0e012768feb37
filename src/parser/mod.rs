//! Indentation-based recursive-descent parser for lite-source text.
//!
//! Each logical line is classified by the pest grammar in
//! `grammar/line.pest`; block structure comes from indentation alone. The
//! parser is all-or-nothing: any unsupported construct aborts the parse and
//! no partial IR is returned.

pub mod grammar;

use crate::error::Warning;
use crate::ir::{self, Block, ElseArm};
use grammar::LineKind;

#[derive(Debug)]
pub struct ParseOutcome {
    pub ir: Option<Block>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone)]
struct Line {
    indent: usize,
    text: String,
    number: usize,
}

pub fn parse(src: &str) -> ParseOutcome {
    let lines = logical_lines(src);
    if lines.is_empty() {
        return ParseOutcome {
            ir: Some(Block::default()),
            warnings: vec![],
        };
    }
    log::debug!("detected indent step: {}", detect_step(&lines));
    let base = lines[0].indent;
    let mut parser = Parser {
        lines: &lines,
        warnings: vec![],
    };
    match parser.parse_block(0, base, 0) {
        Some((block, next)) if next == lines.len() => ParseOutcome {
            ir: Some(block),
            warnings: parser.warnings,
        },
        Some((_, next)) => {
            // A line dedented below the top-level base.
            let number = lines.get(next).map(|l| l.number).unwrap_or(0);
            parser.unsupported(number);
            ParseOutcome {
                ir: None,
                warnings: parser.warnings,
            }
        }
        None => ParseOutcome {
            ir: None,
            warnings: parser.warnings,
        },
    }
}

struct Parser<'a> {
    lines: &'a [Line],
    warnings: Vec<Warning>,
}

impl Parser<'_> {
    fn unsupported(&mut self, number: usize) {
        self.warnings.push(Warning::parse(format!(
            "第 {number} 行附近存在无法识别的程序结构，解析已中止"
        )));
    }

    fn parse_block(&mut self, mut i: usize, base: usize, depth: usize) -> Option<(Block, usize)> {
        let mut nodes = vec![];
        while i < self.lines.len() {
            let line = self.lines[i].clone();
            if line.text.is_empty() {
                nodes.push(ir::Node::Stmt(ir::Stmt {
                    text: "pass".to_string(),
                    source: None,
                    line: Some(line.number),
                }));
                i += 1;
                continue;
            }
            if line.indent < base {
                break;
            }
            if line.indent > base {
                self.unsupported(line.number);
                return None;
            }
            match grammar::classify(&line.text) {
                LineKind::Stmt(text) => {
                    nodes.push(ir::Node::Stmt(ir::Stmt {
                        text,
                        source: None,
                        line: Some(line.number),
                    }));
                    i += 1;
                }
                LineKind::If(cond) => {
                    let (node, next) = self.parse_if(i, cond, base, depth)?;
                    nodes.push(ir::Node::If(node));
                    i = next;
                }
                LineKind::While(cond) => {
                    let (body, next) = self.parse_body(i, depth)?;
                    nodes.push(ir::Node::While(ir::While {
                        cond,
                        body,
                        decision: None,
                        back_edge: None,
                        line: Some(line.number),
                    }));
                    i = next;
                }
                LineKind::For { var, args } => {
                    let (desugared, next) = self.parse_for(i, var, args, depth)?;
                    nodes.extend(desugared);
                    i = next;
                }
                LineKind::Def { name, params } => {
                    if depth > 0 {
                        self.unsupported(line.number);
                        return None;
                    }
                    let (body, next) = self.parse_body(i, depth)?;
                    nodes.push(ir::Node::Func(ir::Func {
                        name,
                        params,
                        body,
                        line: Some(line.number),
                    }));
                    i = next;
                }
                LineKind::Elif(_) | LineKind::Else => {
                    // Only legal directly after an `if` arm; handled there.
                    self.unsupported(line.number);
                    return None;
                }
            }
        }
        Some((Block::new(nodes), i))
    }

    /// Body of a header line: the run of deeper-indented lines below it. The
    /// block base is the actual indent of the first body line.
    fn parse_body(&mut self, header: usize, depth: usize) -> Option<(Block, usize)> {
        let base = self.lines[header].indent;
        let start = header + 1;
        let first = self.lines[start..].iter().find(|l| !l.text.is_empty());
        match first {
            Some(l) if l.indent > base => self.parse_block(start, l.indent, depth + 1),
            _ => {
                self.unsupported(self.lines[header].number);
                None
            }
        }
    }

    fn parse_if(
        &mut self,
        header: usize,
        cond: String,
        base: usize,
        depth: usize,
    ) -> Option<(ir::If, usize)> {
        let number = self.lines[header].number;
        let (then_block, mut next) = self.parse_body(header, depth)?;
        // Blank lines between an arm and its elif/else are cosmetic.
        let mut probe = next;
        while probe < self.lines.len() && self.lines[probe].text.is_empty() {
            probe += 1;
        }
        let mut else_arm = ElseArm::None;
        if probe < self.lines.len() && self.lines[probe].indent == base {
            match grammar::classify(&self.lines[probe].text) {
                LineKind::Elif(inner_cond) => {
                    let (inner, after) = self.parse_if(probe, inner_cond, base, depth)?;
                    else_arm = ElseArm::Elif(Box::new(inner));
                    next = after;
                }
                LineKind::Else => {
                    let (block, after) = self.parse_body(probe, depth)?;
                    else_arm = ElseArm::Block(block);
                    next = after;
                }
                _ => {}
            }
        }
        Some((
            ir::If {
                cond,
                then_block,
                else_arm,
                decision: None,
                join: None,
                line: Some(number),
            },
            next,
        ))
    }

    /// `for v in range(...)` desugars to `v = start; while v ? bound: body;
    /// step`. Induction rebuilds the `for` from that idiom, so the parser
    /// itself never emits a `For` node.
    fn parse_for(
        &mut self,
        header: usize,
        var: String,
        args: Vec<String>,
        depth: usize,
    ) -> Option<(Vec<ir::Node>, usize)> {
        let number = self.lines[header].number;
        let (start, end, step_text) = match args.as_slice() {
            [end] => ("0".to_string(), end.clone(), "1".to_string()),
            [start, end] => (start.clone(), end.clone(), "1".to_string()),
            [start, end, step] => (start.clone(), end.clone(), step.clone()),
            _ => {
                self.unsupported(number);
                return None;
            }
        };
        let Ok(step) = step_text.parse::<i64>() else {
            // The comparison direction needs the step's sign.
            self.unsupported(number);
            return None;
        };
        if step == 0 {
            self.unsupported(number);
            return None;
        }
        let (mut body, next) = self.parse_body(header, depth)?;
        let (cond, step_stmt) = if step > 0 {
            (format!("{var} < {end}"), format!("{var} += {step}"))
        } else {
            (format!("{var} > {end}"), format!("{var} -= {}", -step))
        };
        body.0.push(ir::Node::Stmt(ir::Stmt {
            text: step_stmt,
            source: None,
            line: None,
        }));
        let nodes = vec![
            ir::Node::Stmt(ir::Stmt {
                text: format!("{var} = {start}"),
                source: None,
                line: Some(number),
            }),
            ir::Node::While(ir::While {
                cond,
                body,
                decision: None,
                back_edge: None,
                line: Some(number),
            }),
        ];
        Some((nodes, next))
    }
}

fn logical_lines(src: &str) -> Vec<Line> {
    let mut out: Vec<Line> = vec![];
    let mut doc_close: Option<&'static str> = None;
    for (idx, raw) in src.lines().enumerate() {
        let expanded = raw.replace('\t', "    ");
        let stripped = strip_comment(&expanded);
        let content = stripped.trim_end();
        let trimmed = content.trim_start();
        if let Some(close) = doc_close {
            if trimmed.contains(close) {
                doc_close = None;
            }
            continue;
        }
        if let Some(close) = doc_open(trimmed) {
            if !trimmed[3..].contains(close) {
                doc_close = Some(close);
            }
            continue;
        }
        out.push(Line {
            indent: content.len() - trimmed.len(),
            text: trimmed.to_string(),
            number: idx + 1,
        });
    }
    while out.last().is_some_and(|l| l.text.is_empty()) {
        out.pop();
    }
    let leading = out.iter().take_while(|l| l.text.is_empty()).count();
    out.drain(..leading);
    out
}

fn doc_open(t: &str) -> Option<&'static str> {
    if t.starts_with("\"\"\"") {
        Some("\"\"\"")
    } else if t.starts_with("'''") {
        Some("'''")
    } else {
        None
    }
}

fn strip_comment(line: &str) -> String {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (Some(_), '\\') => escaped = true,
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '#') => return line[..i].to_string(),
            (None, _) => {}
        }
    }
    line.to_string()
}

/// First observed indent increase between consecutive logical lines;
/// defaults to 2.
fn detect_step(lines: &[Line]) -> usize {
    let mut prev: Option<usize> = None;
    for line in lines.iter().filter(|l| !l.text.is_empty()) {
        if let Some(p) = prev
            && line.indent > p
        {
            return line.indent - p;
        }
        prev = Some(line.indent);
    }
    2
}
