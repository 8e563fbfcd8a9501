//! Script AST and canonical source printer.
//!
//! Every node carries the [`Position`] of its first token.  Positions are
//! ignored by `PartialEq`, so a block re-parsed from its formatted text
//! compares equal to the original.

use std::fmt;
use std::sync::Arc;

use super::error::Position;

pub type Block = Vec<Stmt>;

/// Names the statement dispatcher routes to a construct instead of treating
/// them as identifiers.
pub const KEYWORDS: &[&str] = &[
    "if", "else", "for", "in", "break", "continue", "return", "true", "false", "nil",
];

pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_plain_name(s: &str) -> bool {
    is_identifier(s) && !KEYWORDS.contains(&s)
}

// ── Operators ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
        }
    }

    /// Binding strength; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinOp::Gt | BinOp::Ge | BinOp::Lt | BinOp::Le | BinOp::Eq | BinOp::Ne => 1,
            BinOp::Add | BinOp::Sub => 2,
            BinOp::Mul | BinOp::Div => 3,
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// ── Expressions ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Position,
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Expr {
    pub fn new(kind: ExprKind, pos: Position) -> Self {
        Expr { kind, pos }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Int(i64),
    /// Raw literal text; no escape processing is applied.
    Str(String),
    Bool(bool),
    Nil,
    Variable(String),
    List(Seq),
    /// `{ … }` used as a record constructor.
    Block(Block),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call(Call),
    /// `a.b`, `a['b']`, `a.b()`; chains nest through `base`.
    Field(FieldAccess),
    /// `xs[expr]` where the key is not a string literal.
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
}

/// Layout-only content found between the elements of a [`Seq`].
#[derive(Debug, Clone, PartialEq)]
pub enum Trivia {
    NewLine,
    Comment(String),
}

/// The elements of `[…]` or `(…)`, plus the line breaks and comments
/// between them.  `(i, t)` in `trivia` places `t` before element `i`, or
/// before the closing bracket when `i == items.len()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Seq {
    pub items: Vec<Expr>,
    pub trivia: Vec<(usize, Trivia)>,
}

impl Seq {
    pub fn new(items: Vec<Expr>) -> Self {
        Seq {
            items,
            trivia: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Expr> {
        self.items.iter()
    }

    pub fn has_comments(&self) -> bool {
        self.trivia
            .iter()
            .any(|(_, t)| matches!(t, Trivia::Comment(_)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: String,
    pub args: Seq,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldAccess {
    pub base: Box<Expr>,
    pub member: Member,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Name(String),
    Call(Call),
}

// ── Statements ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub pos: Position,
}

impl PartialEq for Stmt {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    NewLine,
    Comment(String),
    Assign {
        target: AssignTarget,
        value: Expr,
    },
    FunctionDecl(Arc<FunctionDecl>),
    /// Expression evaluated for effect: calls, method calls, bare field reads.
    Expr(Expr),
    If {
        cond: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },
    For {
        index: String,
        item: String,
        iterable: String,
        body: Block,
    },
    Return(Option<Expr>),
    Break,
    Continue,
    /// `import 'path'`: splice another script file in place.  Resolved by
    /// the host before evaluation.
    Import(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    Variable(String),
    /// `root.a.b = x` / `root['a'] = x`; `path` is never empty.
    Field { root: String, path: Vec<String> },
}

#[derive(Debug, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Block,
    pub pos: Position,
}

impl Stmt {
    pub fn new(kind: StmtKind, pos: Position) -> Self {
        Stmt { kind, pos }
    }

    /// Name of the function this statement calls, if it is a bare call.
    pub fn call_name(&self) -> Option<&str> {
        match &self.kind {
            StmtKind::Expr(Expr {
                kind: ExprKind::Call(call),
                ..
            }) => Some(&call.name),
            _ => None,
        }
    }

    pub fn comment_text(&self) -> Option<&str> {
        match &self.kind {
            StmtKind::Comment(text) => Some(text),
            _ => None,
        }
    }

    /// Whether this node only matters for layout.
    pub fn is_trivia(&self) -> bool {
        matches!(self.kind, StmtKind::NewLine | StmtKind::Comment(_))
    }
}

// ── Printer ───────────────────────────────────────────────────────────────────

/// Re-serialize a block to canonical source text.
pub fn format_block(block: &[Stmt]) -> String {
    let mut p = Printer::default();
    p.block(block, ' ');
    p.out
}

#[derive(Default)]
struct Printer {
    out: String,
    indent: usize,
    at_line_start: bool,
}

impl Printer {
    fn lead(&mut self) {
        if self.at_line_start {
            for _ in 0..self.indent {
                self.out.push_str("  ");
            }
            self.at_line_start = false;
        }
    }

    fn text(&mut self, s: &str) {
        self.lead();
        self.out.push_str(s);
    }

    /// Statements of one block; `sep` goes between two statements that share
    /// a line.
    fn block(&mut self, block: &[Stmt], sep: char) {
        let mut prev_inline = false;
        for stmt in block {
            match &stmt.kind {
                StmtKind::NewLine => {
                    self.out.push('\n');
                    self.at_line_start = true;
                    prev_inline = false;
                    continue;
                }
                StmtKind::Comment(_) => {}
                _ if prev_inline => {
                    if sep != ' ' {
                        self.out.push(sep);
                    }
                    self.out.push(' ');
                }
                _ => {}
            }
            self.stmt(stmt);
            prev_inline = true;
        }
    }

    fn braced(&mut self, block: &[Stmt], sep: char) {
        self.text("{");
        self.indent += 1;
        self.block(block, sep);
        self.indent -= 1;
        self.text("}");
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::NewLine => {
                self.out.push('\n');
                self.at_line_start = true;
            }
            StmtKind::Comment(text) => self.comment(text),
            StmtKind::Assign { target, value } => {
                match target {
                    AssignTarget::Variable(name) => self.name(name),
                    AssignTarget::Field { root, path } => {
                        self.text(root);
                        for key in path {
                            self.key(key);
                        }
                    }
                }
                self.text(" = ");
                self.expr(value, 0);
            }
            StmtKind::FunctionDecl(decl) => {
                self.text(&decl.name);
                self.text("(");
                self.text(&decl.params.join(", "));
                self.text(") ");
                self.braced(&decl.body, ' ');
            }
            StmtKind::Expr(e) => self.expr(e, 0),
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                self.text("if ");
                self.expr(cond, 0);
                self.text(" ");
                self.braced(then_block, ' ');
                if let Some(else_block) = else_block {
                    self.text(" else ");
                    self.braced(else_block, ' ');
                }
            }
            StmtKind::For {
                index,
                item,
                iterable,
                body,
            } => {
                self.text(&format!("for {index}, {item} in {iterable} "));
                self.braced(body, ' ');
            }
            StmtKind::Return(value) => {
                self.text("return");
                if let Some(v) = value {
                    self.text(" ");
                    self.expr(v, 0);
                }
            }
            StmtKind::Break => self.text("break"),
            StmtKind::Continue => self.text("continue"),
            StmtKind::Import(path) => self.text(&format!("import '{path}'")),
        }
    }

    fn name(&mut self, name: &str) {
        if is_plain_name(name) {
            self.text(name);
        } else {
            self.text(&format!("'{name}'"));
        }
    }

    fn key(&mut self, key: &str) {
        if is_identifier(key) {
            self.text(".");
            self.text(key);
        } else {
            self.text(&format!("['{key}']"));
        }
    }

    fn call(&mut self, call: &Call) {
        self.text(&call.name);
        self.seq(&call.args, "(", ")");
    }

    /// Elements joined by `, `.  Recorded line breaks and comments are
    /// replayed in place; elements on a new line are indented one level.
    fn seq(&mut self, seq: &Seq, open: &str, close: &str) {
        self.text(open);
        if seq.trivia.is_empty() {
            for (i, item) in seq.items.iter().enumerate() {
                if i > 0 {
                    self.text(", ");
                }
                self.expr(item, 0);
            }
            self.text(close);
            return;
        }

        self.indent += 1;
        let mut trivia = seq.trivia.iter().peekable();
        let mut after_item = false;
        for i in 0..=seq.items.len() {
            while let Some((_, t)) = trivia.next_if(|(at, _)| *at <= i) {
                match t {
                    Trivia::NewLine => {
                        self.out.push('\n');
                        self.at_line_start = true;
                        after_item = false;
                    }
                    Trivia::Comment(text) => self.comment(text),
                }
            }
            if i == seq.items.len() {
                break;
            }
            if after_item {
                self.text(", ");
            }
            self.expr(&seq.items[i], 0);
            after_item = true;
        }
        self.indent -= 1;
        self.text(close);
    }

    fn comment(&mut self, text: &str) {
        if matches!(self.out.chars().last(), Some(c) if !c.is_whitespace()) {
            self.out.push(' ');
        }
        self.text("//");
        self.out.push_str(text);
    }

    /// `min_prec` is the weakest operator that may appear unparenthesized.
    fn expr(&mut self, e: &Expr, min_prec: u8) {
        match &e.kind {
            ExprKind::Int(n) => self.text(&n.to_string()),
            ExprKind::Str(s) => self.text(&format!("'{s}'")),
            ExprKind::Bool(b) => self.text(if *b { "true" } else { "false" }),
            ExprKind::Nil => self.text("nil"),
            ExprKind::Variable(name) => self.text(name),
            ExprKind::List(items) => self.seq(items, "[", "]"),
            ExprKind::Block(block) => self.braced(block, ','),
            ExprKind::Binary { op, left, right } => {
                let prec = op.precedence();
                let paren = prec < min_prec;
                if paren {
                    self.text("(");
                }
                self.expr(left, prec);
                self.text(&format!(" {op} "));
                self.expr(right, prec + 1);
                if paren {
                    self.text(")");
                }
            }
            ExprKind::Call(call) => self.call(call),
            ExprKind::Field(access) => {
                self.expr(&access.base, u8::MAX);
                match &access.member {
                    Member::Name(key) => self.key(key),
                    Member::Call(call) => {
                        self.text(".");
                        self.call(call);
                    }
                }
            }
            ExprKind::Index { base, index } => {
                self.expr(base, u8::MAX);
                self.text("[");
                self.expr(index, 0);
                self.text("]");
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut p = Printer::default();
        p.expr(self, 0);
        f.write_str(&p.out)
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut p = Printer::default();
        p.stmt(self);
        f.write_str(&p.out)
    }
}

impl fmt::Display for FunctionDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.params.join(", "))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
