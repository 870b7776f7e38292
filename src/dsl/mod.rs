//! # DSL Parser (C3, spec.md §4.3)
//!
//! Recursive-descent parser for the boolean `combineWith` expression.
//! Produces a `FilterTree` — an AST carrying only filter-key identifiers,
//! never values — that can be `generate`d against a `FilterContext` once
//! per request, or reused structurally across requests sharing the same
//! shape.
//!
//! ```text
//! expr   = term {"|" term}
//! term   = factor {"&" factor}
//! factor = ["!"] (ident | "(" expr ")")
//! ident  = (letter|"_") {letter|digit|"_"}
//! ```
//! Precedence (high→low): `!` (unary, right), `&` (left), `|` (left).

use std::collections::HashMap;

use crate::backend::PropertyReference;
use crate::condition::{Condition, FilterContext};
use crate::error::{DslSyntaxError, Result as FqlResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Ident(String),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Not(Box<Node>),
}

impl Node {
    fn render(&self) -> String {
        match self {
            Node::Ident(id) => id.clone(),
            Node::And(l, r) => format!("{} & {}", l.render_operand(Node::and_prec()), r.render_operand(Node::and_prec())),
            Node::Or(l, r) => format!("{} | {}", l.render_operand(Node::or_prec()), r.render_operand(Node::or_prec())),
            Node::Not(inner) => format!("!{}", inner.render_operand(Node::not_prec())),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Node::Ident(_) => 3,
            Node::Not(_) => 2,
            Node::And(..) => 1,
            Node::Or(..) => 0,
        }
    }

    fn and_prec() -> u8 {
        1
    }
    fn or_prec() -> u8 {
        0
    }
    fn not_prec() -> u8 {
        2
    }

    fn render_operand(&self, parent_prec: u8) -> String {
        if self.precedence() < parent_prec {
            format!("({})", self.render())
        } else {
            self.render()
        }
    }
}

/// A parsed, reusable boolean expression over filter-request keys.
#[derive(Debug, Clone)]
pub struct FilterTree {
    root: Node,
}

impl FilterTree {
    /// Parse `dsl`, enforcing `max_len` (spec.md §6 `maxDslLength`).
    #[tracing::instrument(level = "debug", skip(dsl), fields(dsl_len = dsl.len()))]
    pub fn parse(dsl: &str, max_len: usize) -> Result<FilterTree, DslSyntaxError> {
        if dsl.len() > max_len {
            return Err(DslSyntaxError::TooLong {
                length: dsl.len(),
                max: max_len,
            });
        }
        let mut parser = Parser::new(dsl);
        let root = parser.parse_expr()?;
        parser.skip_whitespace();
        if parser.pos < parser.chars.len() {
            return Err(DslSyntaxError::TrailingInput {
                position: parser.pos,
                remainder: parser.chars[parser.pos..].iter().collect(),
            });
        }
        tracing::debug!("parsed DSL expression");
        Ok(FilterTree { root })
    }

    /// Expand the literal shorthand strings `AND`/`OR`/`NOT` to a full
    /// expression over every key in `keys`, in iteration order. Any other
    /// string is returned unchanged. Per spec.md §9's open question, this
    /// expands unconditionally — even if a filter key happens to be named
    /// `AND`, `OR`, or `NOT`.
    pub fn expand_shorthand(dsl: &str, keys: &[String]) -> String {
        match dsl.trim() {
            "AND" => keys.join(" & "),
            "OR" => keys.join(" | "),
            "NOT" => format!("!({})", keys.join(" & ")),
            _ => dsl.to_string(),
        }
    }

    /// Re-render the tree to canonical form. Idempotent: `parse(s).render()
    /// == s` up to canonical whitespace (spec.md §8).
    pub fn render(&self) -> String {
        self.root.render()
    }

    /// Walk the tree, resolving each identifier against `definitions`
    /// (filter key → `(property, op_code)`) via `context.to_condition`, and
    /// combining per the tree's `AND`/`OR`/`NOT` structure.
    pub fn generate<P: PropertyReference>(
        &self,
        definitions: &HashMap<String, (P, String)>,
        context: &FilterContext<P>,
    ) -> FqlResult<Condition<P>> {
        self.generate_node(&self.root, definitions, context)
    }

    fn generate_node<P: PropertyReference>(
        &self,
        node: &Node,
        definitions: &HashMap<String, (P, String)>,
        context: &FilterContext<P>,
    ) -> FqlResult<Condition<P>> {
        match node {
            Node::Ident(id) => {
                let (property, op_code) = definitions.get(id).ok_or_else(|| {
                    let mut available: Vec<&str> = definitions.keys().map(String::as_str).collect();
                    available.sort_unstable();
                    DslSyntaxError::UndefinedReference {
                        id: id.clone(),
                        available: available.join(", "),
                    }
                })?;
                Ok(context.to_condition(id.clone(), *property, op_code)?)
            }
            Node::And(l, r) => {
                let left = self.generate_node(l, definitions, context)?;
                let right = self.generate_node(r, definitions, context)?;
                Ok(left.and(&right))
            }
            Node::Or(l, r) => {
                let left = self.generate_node(l, definitions, context)?;
                let right = self.generate_node(r, definitions, context)?;
                Ok(left.or(&right))
            }
            Node::Not(inner) => {
                let inner = self.generate_node(inner, definitions, context)?;
                Ok(inner.not())
            }
        }
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(source: &str) -> Self {
        Parser {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        self.skip_whitespace();
        let c = self.chars.get(self.pos).copied();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn parse_expr(&mut self) -> Result<Node, DslSyntaxError> {
        self.skip_whitespace();
        if self.chars.is_empty() {
            return Err(DslSyntaxError::Empty);
        }
        let mut node = self.parse_term()?;
        loop {
            let before = self.pos;
            match self.peek() {
                Some('|') => {
                    self.bump();
                    let rhs_start = self.pos;
                    let rhs = self.parse_term().map_err(|_| DslSyntaxError::MissingOperand {
                        operator: '|',
                        position: rhs_start,
                    })?;
                    node = Node::Or(Box::new(node), Box::new(rhs));
                }
                _ => {
                    self.pos = before;
                    break;
                }
            }
        }
        Ok(node)
    }

    fn parse_term(&mut self) -> Result<Node, DslSyntaxError> {
        let mut node = self.parse_factor()?;
        loop {
            let before = self.pos;
            match self.peek() {
                Some('&') => {
                    self.bump();
                    let rhs_start = self.pos;
                    let rhs = self.parse_factor().map_err(|_| DslSyntaxError::MissingOperand {
                        operator: '&',
                        position: rhs_start,
                    })?;
                    node = Node::And(Box::new(node), Box::new(rhs));
                }
                _ => {
                    self.pos = before;
                    break;
                }
            }
        }
        Ok(node)
    }

    fn parse_factor(&mut self) -> Result<Node, DslSyntaxError> {
        match self.peek() {
            Some('!') => {
                self.bump();
                let operand_start = self.pos;
                let inner = self.parse_factor().map_err(|_| DslSyntaxError::MissingOperand {
                    operator: '!',
                    position: operand_start,
                })?;
                Ok(Node::Not(Box::new(inner)))
            }
            Some('(') => {
                self.bump();
                let inner = self.parse_expr()?;
                match self.bump() {
                    Some(')') => Ok(inner),
                    _ => Err(DslSyntaxError::UnmatchedParen { position: self.pos }),
                }
            }
            Some(c) if is_ident_start(c) => self.parse_ident(),
            Some(c) if c.is_ascii_digit() => {
                let position = self.pos;
                Err(DslSyntaxError::InvalidIdentifier {
                    text: c.to_string(),
                    position,
                })
            }
            Some(c) => Err(DslSyntaxError::UnexpectedCharacter {
                character: c,
                position: self.pos,
            }),
            None => Err(DslSyntaxError::Empty),
        }
    }

    fn parse_ident(&mut self) -> Result<Node, DslSyntaxError> {
        self.skip_whitespace();
        let start = self.pos;
        while self.pos < self.chars.len() && is_ident_continue(self.chars[self.pos]) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        Ok(Node::Ident(text))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
