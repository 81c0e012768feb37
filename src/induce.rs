//! For-loop induction: rewrites the `init; while var ? bound: body; step`
//! idiom into a counted `for` loop, bottom-up. A loop that looks inducible
//! but misses a precondition stays a `while` and gets a warning naming the
//! exact defect, so the user always learns why no `for` came back.

use crate::error::Warning;
use crate::ir::{Block, ElseArm, For, Node, While};

pub fn induce(block: Block) -> (Block, Vec<Warning>) {
    let mut warnings = vec![];
    let out = induce_block(block, &mut warnings);
    scan_missing_init(&out, &mut warnings);
    (out, warnings)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cmp {
    Lt,
    Le,
    Gt,
    Ge,
}

fn induce_block(block: Block, warnings: &mut Vec<Warning>) -> Block {
    // Children first, so nested loops induce before their parents are
    // inspected.
    let nodes: Vec<Node> = block
        .0
        .into_iter()
        .map(|node| match node {
            Node::If(mut f) => {
                f.then_block = induce_block(f.then_block, warnings);
                f.else_arm = match f.else_arm {
                    ElseArm::None => ElseArm::None,
                    ElseArm::Elif(inner) => {
                        let Node::If(folded) = induce_block(
                            Block::new(vec![Node::If(*inner)]),
                            warnings,
                        )
                        .0
                        .remove(0) else {
                            unreachable!()
                        };
                        ElseArm::Elif(Box::new(folded))
                    }
                    ElseArm::Block(b) => ElseArm::Block(induce_block(b, warnings)),
                };
                Node::If(f)
            }
            Node::While(mut w) => {
                w.body = induce_block(w.body, warnings);
                Node::While(w)
            }
            Node::For(mut f) => {
                f.body = induce_block(f.body, warnings);
                Node::For(f)
            }
            Node::Func(mut f) => {
                f.body = induce_block(f.body, warnings);
                Node::Func(f)
            }
            stmt => stmt,
        })
        .collect();

    // Then this level's whiles.
    let mut out: Vec<Node> = vec![];
    for node in nodes {
        let Node::While(w) = node else {
            out.push(node);
            continue;
        };
        match try_induce(&w, &out) {
            Attempt::Induce { init_index, start } => {
                let mut body = w.body;
                let Some(Node::Stmt(step_stmt)) = body.0.pop() else {
                    unreachable!()
                };
                let (var, delta) = parse_step(&step_stmt.text).unwrap();
                let (_, cmp, bound) = parse_compare(&w.cond).unwrap();
                out.remove(init_index);
                out.push(Node::For(For {
                    var,
                    start,
                    end: exclusive_bound(cmp, &bound),
                    step: delta,
                    body,
                    line: w.line,
                }));
            }
            Attempt::Keep(mut found) => {
                warnings.append(&mut found);
                out.push(Node::While(w));
            }
        }
    }
    Block::new(out)
}

enum Attempt {
    Induce { init_index: usize, start: String },
    Keep(Vec<Warning>),
}

fn try_induce(w: &While, siblings: &[Node]) -> Attempt {
    let Some((var, cmp, _)) = parse_compare(&w.cond) else {
        return Attempt::Keep(vec![]);
    };
    let last_step = w
        .body
        .0
        .last()
        .and_then(stmt_text)
        .and_then(parse_step)
        .filter(|(v, _)| *v == var);
    let Some((_, delta)) = last_step else {
        // Induction is not attempted, but a step buried elsewhere in the
        // body still deserves an explanation.
        if step_somewhere(&w.body, &var) {
            let mut found = vec![Warning::induction(format!(
                "归纳失败：步进语句不是循环 while {} 循环体的最后一条语句",
                w.cond
            ))];
            if find_init(siblings, &var).is_none() {
                found.push(missing_init(&w.cond, &var));
            }
            return Attempt::Keep(found);
        }
        return Attempt::Keep(vec![]);
    };
    if count_writes(&w.body, &var) > 1 {
        return Attempt::Keep(vec![Warning::induction(format!(
            "归纳失败：循环变量 {var} 在循环体内被多次赋值"
        ))]);
    }
    if !direction_ok(cmp, delta) {
        return Attempt::Keep(vec![Warning::induction(format!(
            "归纳失败：步进方向与循环条件 {} 不一致",
            w.cond
        ))]);
    }
    let Some((init_index, start)) = find_init(siblings, &var) else {
        return Attempt::Keep(vec![missing_init(&w.cond, &var)]);
    };
    Attempt::Induce { init_index, start }
}

fn missing_init(cond: &str, var: &str) -> Warning {
    Warning::induction(format!(
        "归纳失败：循环 while {cond} 的循环变量 {var} 缺少初始化语句（如 {var} = 0）"
    ))
}

/// Second pass over the finished tree: any remaining while that contains a
/// step for its counter but has no initializer gets the missing-initializer
/// warning, even when induction was never attempted for it.
fn scan_missing_init(block: &Block, warnings: &mut Vec<Warning>) {
    for (i, node) in block.0.iter().enumerate() {
        match node {
            Node::While(w) => {
                if let Some((var, _, _)) = parse_compare(&w.cond)
                    && step_somewhere(&w.body, &var)
                    && find_init(&block.0[..i], &var).is_none()
                {
                    let warning = missing_init(&w.cond, &var);
                    if !warnings.contains(&warning) {
                        warnings.push(warning);
                    }
                }
                scan_missing_init(&w.body, warnings);
            }
            Node::If(f) => {
                scan_missing_init(&f.then_block, warnings);
                let mut arm = &f.else_arm;
                while let ElseArm::Elif(inner) = arm {
                    scan_missing_init(&inner.then_block, warnings);
                    arm = &inner.else_arm;
                }
                if let ElseArm::Block(b) = arm {
                    scan_missing_init(b, warnings);
                }
            }
            Node::For(f) => scan_missing_init(&f.body, warnings),
            Node::Func(f) => scan_missing_init(&f.body, warnings),
            Node::Stmt(_) => {}
        }
    }
}

fn stmt_text(node: &Node) -> Option<&str> {
    match node {
        Node::Stmt(s) => Some(&s.text),
        _ => None,
    }
}

/// `<var> <cmp> <bound>` with a bare identifier on the left.
fn parse_compare(cond: &str) -> Option<(String, Cmp, String)> {
    for (op, cmp) in [("<=", Cmp::Le), (">=", Cmp::Ge), ("<", Cmp::Lt), (">", Cmp::Gt)] {
        if let Some(pos) = cond.find(op) {
            let var = cond[..pos].trim();
            let bound = cond[pos + op.len()..].trim();
            if is_ident(var) && !bound.is_empty() {
                return Some((var.to_string(), cmp, bound.to_string()));
            }
            return None;
        }
    }
    None
}

/// `v += k`, `v -= k`, `v = v + k`, `v = v - k`, with a positive integer
/// literal `k`. Returns the counter and the signed delta.
fn parse_step(text: &str) -> Option<(String, i64)> {
    let t = text.trim();
    for (op, sign) in [("+=", 1i64), ("-=", -1i64)] {
        if let Some(pos) = t.find(op) {
            let var = t[..pos].trim();
            let k = t[pos + op.len()..].trim().parse::<i64>().ok()?;
            if is_ident(var) && k > 0 {
                return Some((var.to_string(), sign * k));
            }
            return None;
        }
    }
    let pos = t.find('=')?;
    if t[pos + 1..].starts_with('=') {
        return None;
    }
    let var = t[..pos].trim();
    if !is_ident(var) {
        return None;
    }
    let rhs = t[pos + 1..].trim();
    let rest = rhs.strip_prefix(var)?.trim_start();
    let (sign, k_text) = if let Some(k) = rest.strip_prefix('+') {
        (1i64, k.trim())
    } else if let Some(k) = rest.strip_prefix('-') {
        (-1i64, k.trim())
    } else {
        return None;
    };
    let k = k_text.parse::<i64>().ok()?;
    (k > 0).then(|| (var.to_string(), sign * k))
}

fn direction_ok(cmp: Cmp, delta: i64) -> bool {
    match cmp {
        Cmp::Lt | Cmp::Le => delta > 0,
        Cmp::Gt | Cmp::Ge => delta < 0,
    }
}

/// Inclusive bounds become exclusive; non-numeric bounds are wrapped so the
/// adjustment stays textual.
fn exclusive_bound(cmp: Cmp, bound: &str) -> String {
    match cmp {
        Cmp::Lt | Cmp::Gt => bound.to_string(),
        Cmp::Le => match bound.parse::<i64>() {
            Ok(v) => (v + 1).to_string(),
            Err(_) => format!("({bound}) + 1"),
        },
        Cmp::Ge => match bound.parse::<i64>() {
            Ok(v) => (v - 1).to_string(),
            Err(_) => format!("({bound}) - 1"),
        },
    }
}

/// Nearest preceding `var = <expr>` sibling.
fn find_init(siblings: &[Node], var: &str) -> Option<(usize, String)> {
    for (i, node) in siblings.iter().enumerate().rev() {
        let Some(text) = stmt_text(node) else { continue };
        let t = text.trim();
        let Some(rest) = t.strip_prefix(var) else {
            continue;
        };
        let rest = rest.trim_start();
        if let Some(expr) = rest.strip_prefix('=')
            && !expr.starts_with('=')
            && !"+-*/%".contains(t.as_bytes()[var.len()] as char)
        {
            let expr = expr.trim();
            if !expr.is_empty() {
                return Some((i, expr.to_string()));
            }
        }
    }
    None
}

fn assigns(text: &str, var: &str) -> bool {
    let t = text.trim();
    let Some(rest) = t.strip_prefix(var) else {
        return false;
    };
    let rest = rest.trim_start();
    for op in ["+=", "-=", "*=", "/=", "//=", "%="] {
        if rest.starts_with(op) {
            return true;
        }
    }
    rest.starts_with('=') && !rest.starts_with("==")
}

fn count_writes(block: &Block, var: &str) -> usize {
    block
        .0
        .iter()
        .map(|node| match node {
            Node::Stmt(s) => usize::from(assigns(&s.text, var)),
            Node::If(f) => {
                let mut n = count_writes(&f.then_block, var);
                let mut arm = &f.else_arm;
                while let ElseArm::Elif(inner) = arm {
                    n += count_writes(&inner.then_block, var);
                    arm = &inner.else_arm;
                }
                if let ElseArm::Block(b) = arm {
                    n += count_writes(b, var);
                }
                n
            }
            Node::While(w) => count_writes(&w.body, var),
            Node::For(f) => count_writes(&f.body, var),
            Node::Func(f) => count_writes(&f.body, var),
        })
        .sum()
}

fn step_somewhere(block: &Block, var: &str) -> bool {
    block.0.iter().any(|node| match node {
        Node::Stmt(s) => parse_step(&s.text).is_some_and(|(v, _)| v == var),
        Node::If(f) => {
            if step_somewhere(&f.then_block, var) {
                return true;
            }
            let mut arm = &f.else_arm;
            loop {
                match arm {
                    ElseArm::Elif(inner) => {
                        if step_somewhere(&inner.then_block, var) {
                            return true;
                        }
                        arm = &inner.else_arm;
                    }
                    ElseArm::Block(b) => return step_somewhere(b, var),
                    ElseArm::None => return false,
                }
            }
        }
        Node::While(w) => step_somewhere(&w.body, var),
        Node::For(f) => step_somewhere(&f.body, var),
        Node::Func(f) => step_somewhere(&f.body, var),
    })
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
