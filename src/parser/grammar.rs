use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "../grammar/line.pest"]
struct LineParser;

/// Classification of one logical line of lite-source.
#[derive(Debug, Clone, PartialEq)]
pub enum LineKind {
    If(String),
    Elif(String),
    Else,
    While(String),
    For { var: String, args: Vec<String> },
    Def { name: String, params: String },
    Stmt(String),
}

/// Classifies a non-empty, trimmed logical line. `Statement` is the grammar's
/// catch-all, so unknown headers come back as opaque statements and only an
/// unexpected indented body below them fails the parse.
pub fn classify(text: &str) -> LineKind {
    let Ok(mut pairs) = LineParser::parse(Rule::Line, text) else {
        return LineKind::Stmt(text.to_string());
    };
    let header = pairs.next().unwrap().into_inner().next().unwrap();
    match header.as_rule() {
        Rule::IfHeader => LineKind::If(cond_of(header)),
        Rule::ElifHeader => LineKind::Elif(cond_of(header)),
        Rule::ElseHeader => LineKind::Else,
        Rule::WhileHeader => LineKind::While(cond_of(header)),
        Rule::ForHeader => {
            let mut var = String::new();
            let mut args = vec![];
            for pair in header.into_inner() {
                match pair.as_rule() {
                    Rule::Ident => var = pair.as_str().to_string(),
                    Rule::RangeArgs => {
                        args = pair
                            .into_inner()
                            .map(|a| a.as_str().trim().to_string())
                            .collect();
                    }
                    _ => {}
                }
            }
            LineKind::For { var, args }
        }
        Rule::DefHeader => {
            let mut name = String::new();
            let mut params = String::new();
            for pair in header.into_inner() {
                match pair.as_rule() {
                    Rule::Ident => name = pair.as_str().to_string(),
                    Rule::Params => params = pair.as_str().trim().to_string(),
                    _ => {}
                }
            }
            LineKind::Def { name, params }
        }
        Rule::Statement => LineKind::Stmt(header.as_str().to_string()),
        _ => LineKind::Stmt(text.to_string()),
    }
}

fn cond_of(header: Pair<Rule>) -> String {
    header
        .into_inner()
        .find(|p| p.as_rule() == Rule::Cond)
        .map(|p| p.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Callee name when the line is a bare call, optionally captured by a single
/// assignment (`foo(x)`, `y = foo(x)`). Anything else returns `None`.
pub fn call_target(text: &str) -> Option<String> {
    let mut pairs = LineParser::parse(Rule::CallLine, text).ok()?;
    let callee = pairs
        .next()
        .unwrap()
        .into_inner()
        .filter(|p| p.as_rule() == Rule::Ident)
        .last()?;
    Some(callee.as_str().to_string())
}
