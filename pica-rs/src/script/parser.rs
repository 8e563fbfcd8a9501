//! Recursive-descent parser.
//!
//! Statements are dispatched on their leading token.  Binary expressions use
//! precedence climbing over [`BinOp::precedence`] (lowest → highest):
//!   comparison  →  additive  →  multiplicative  →  unary minus  →  postfix  →  primary
//! Every binary level is left-associative.

use std::sync::Arc;

use super::ast::{
    AssignTarget, BinOp, Block, Call, Expr, ExprKind, FieldAccess, FunctionDecl, Member, Seq,
    Stmt, StmtKind, Trivia,
};
use super::error::{ParseError, Position};
use super::lexer::{Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    eof: Token,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        let end = tokens.last().map(|t| t.pos).unwrap_or_default();
        Parser {
            tokens,
            pos: 0,
            eof: Token::new(TokenKind::Eof, "", end),
        }
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&self.eof)
    }

    fn lookahead(&self, n: usize) -> &Token {
        self.tokens.get(self.pos + n).unwrap_or(&self.eof)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn at_keyword(&self, word: &str) -> bool {
        self.at(TokenKind::Name) && self.current().text == word
    }

    fn advance(&mut self) -> Token {
        let tok = self.current().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn error(&self, expected: impl Into<String>) -> ParseError {
        let cur = self.current();
        ParseError::new(expected, cur.describe(), cur.pos)
    }

    fn consume(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(kind.to_string()))
        }
    }

    /// Parse statements until EOF.
    pub fn parse(&mut self) -> Result<Block, ParseError> {
        let mut block = Block::new();
        while !self.at(TokenKind::Eof) {
            block.push(self.statement()?);
        }
        Ok(block)
    }

    // ── Statements ────────────────────────────────────────────────────────────

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        let tok = self.current().clone();
        let pos = tok.pos;
        match tok.kind {
            TokenKind::NewLine => {
                self.advance();
                Ok(Stmt::new(StmtKind::NewLine, pos))
            }
            TokenKind::Comment => {
                self.advance();
                Ok(Stmt::new(StmtKind::Comment(tok.text), pos))
            }
            TokenKind::Str if self.lookahead(1).kind == TokenKind::Assign => {
                self.advance();
                self.advance();
                let value = self.expr()?;
                Ok(Stmt::new(
                    StmtKind::Assign {
                        target: AssignTarget::Variable(tok.text),
                        value,
                    },
                    pos,
                ))
            }
            TokenKind::Name => match tok.text.as_str() {
                "if" => {
                    self.advance();
                    self.if_stmt(pos)
                }
                "for" => {
                    self.advance();
                    self.for_stmt(pos)
                }
                "return" => {
                    self.advance();
                    let value = if matches!(
                        self.current().kind,
                        TokenKind::NewLine | TokenKind::Comment | TokenKind::RBrace | TokenKind::Eof
                    ) {
                        None
                    } else {
                        Some(self.expr()?)
                    };
                    Ok(Stmt::new(StmtKind::Return(value), pos))
                }
                "break" => {
                    self.advance();
                    Ok(Stmt::new(StmtKind::Break, pos))
                }
                "import" if self.lookahead(1).kind == TokenKind::Str => {
                    self.advance();
                    let path = self.advance().text;
                    Ok(Stmt::new(StmtKind::Import(path), pos))
                }
                "continue" => {
                    self.advance();
                    Ok(Stmt::new(StmtKind::Continue, pos))
                }
                _ => self.name_statement(pos),
            },
            _ => Err(self.error("statement")),
        }
    }

    /// `NAME = …`, `NAME(…)`, `NAME(…) { … }`, `NAME.…`, `NAME[…]`.
    fn name_statement(&mut self, pos: Position) -> Result<Stmt, ParseError> {
        match self.lookahead(1).kind {
            TokenKind::Assign => {
                let name = self.advance().text;
                self.advance();
                let value = self.expr()?;
                return Ok(Stmt::new(
                    StmtKind::Assign {
                        target: AssignTarget::Variable(name),
                        value,
                    },
                    pos,
                ));
            }
            TokenKind::LParen | TokenKind::Dot | TokenKind::LBracket => {}
            _ => {
                self.advance();
                return Err(self.error("'=', '(', '.' or '['"));
            }
        }

        let target = self.postfix()?;
        if self.at(TokenKind::LBrace) {
            if let ExprKind::Call(call) = target.kind {
                return self.function_decl(call, pos);
            }
        }
        if self.at(TokenKind::Assign) {
            let target = assign_target(&target)
                .ok_or_else(|| ParseError::new("assignable field", target.to_string(), pos))?;
            self.advance();
            let value = self.expr()?;
            return Ok(Stmt::new(StmtKind::Assign { target, value }, pos));
        }
        Ok(Stmt::new(StmtKind::Expr(target), pos))
    }

    fn function_decl(&mut self, call: Call, pos: Position) -> Result<Stmt, ParseError> {
        if let Some((_, Trivia::Comment(text))) = call
            .args
            .trivia
            .iter()
            .find(|(_, t)| matches!(t, Trivia::Comment(_)))
        {
            return Err(ParseError::new("parameter name", format!("//{text}"), pos));
        }
        let mut params = Vec::with_capacity(call.args.len());
        for arg in call.args.items {
            match arg.kind {
                ExprKind::Variable(name) => params.push(name),
                _ => return Err(ParseError::new("parameter name", arg.to_string(), arg.pos)),
            }
        }
        self.consume(TokenKind::LBrace)?;
        let body = self.block_body()?;
        Ok(Stmt::new(
            StmtKind::FunctionDecl(Arc::new(FunctionDecl {
                name: call.name,
                params,
                body,
                pos,
            })),
            pos,
        ))
    }

    /// Statements after an opening `{`, through the matching `}`.
    fn block_body(&mut self) -> Result<Block, ParseError> {
        let mut block = Block::new();
        loop {
            match self.current().kind {
                TokenKind::RBrace => {
                    self.advance();
                    return Ok(block);
                }
                TokenKind::Eof => return Err(self.error("'}'")),
                _ => block.push(self.statement()?),
            }
        }
    }

    fn if_stmt(&mut self, pos: Position) -> Result<Stmt, ParseError> {
        let cond = self.expr()?;
        self.consume(TokenKind::LBrace)?;
        let then_block = self.block_body()?;
        let else_block = if self.at_keyword("else") {
            let else_pos = self.advance().pos;
            if self.at_keyword("if") {
                self.advance();
                Some(vec![self.if_stmt(else_pos)?])
            } else {
                self.consume(TokenKind::LBrace)?;
                Some(self.block_body()?)
            }
        } else {
            None
        };
        Ok(Stmt::new(
            StmtKind::If {
                cond,
                then_block,
                else_block,
            },
            pos,
        ))
    }

    /// `for { … }` or `for i, v in xs { … }`.
    fn for_stmt(&mut self, pos: Position) -> Result<Stmt, ParseError> {
        let (index, item, iterable) = if self.at(TokenKind::Name) {
            let index = self.advance().text;
            self.consume(TokenKind::Comma)?;
            let item = self.consume(TokenKind::Name)?.text;
            if !self.at_keyword("in") {
                return Err(self.error("'in'"));
            }
            self.advance();
            let iterable = self.consume(TokenKind::Name)?.text;
            (index, item, iterable)
        } else {
            ("index".to_owned(), "item".to_owned(), "items".to_owned())
        };
        self.consume(TokenKind::LBrace)?;
        let body = self.block_body()?;
        Ok(Stmt::new(
            StmtKind::For {
                index,
                item,
                iterable,
                body,
            },
            pos,
        ))
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    pub fn expr(&mut self) -> Result<Expr, ParseError> {
        self.binary(1)
    }

    fn binary_op(&self) -> Option<BinOp> {
        Some(match self.current().kind {
            TokenKind::Plus => BinOp::Add,
            TokenKind::Minus => BinOp::Sub,
            TokenKind::Star => BinOp::Mul,
            TokenKind::Slash => BinOp::Div,
            TokenKind::Gt => BinOp::Gt,
            TokenKind::Ge => BinOp::Ge,
            TokenKind::Lt => BinOp::Lt,
            TokenKind::Le => BinOp::Le,
            TokenKind::Eq => BinOp::Eq,
            TokenKind::Ne => BinOp::Ne,
            _ => return None,
        })
    }

    fn binary(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let mut left = self.unary()?;
        while let Some(op) = self.binary_op() {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            let pos = self.advance().pos;
            let right = self.binary(prec + 1)?;
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                pos,
            );
        }
        Ok(left)
    }

    /// A leading `-` is only accepted directly before an integer literal.
    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.at(TokenKind::Minus) && self.lookahead(1).kind == TokenKind::Int {
            let pos = self.advance().pos;
            let tok = self.advance();
            let n = format!("-{}", tok.text)
                .parse::<i64>()
                .map_err(|_| ParseError::new("64-bit integer", tok.describe(), tok.pos))?;
            return Ok(Expr::new(ExprKind::Int(n), pos));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        loop {
            match self.current().kind {
                TokenKind::Dot => {
                    self.advance();
                    let name = self.consume(TokenKind::Name)?;
                    let member = if self.at(TokenKind::LParen) {
                        Member::Call(self.call(name.text)?)
                    } else {
                        Member::Name(name.text)
                    };
                    expr = Expr::new(
                        ExprKind::Field(FieldAccess {
                            base: Box::new(expr),
                            member,
                        }),
                        name.pos,
                    );
                }
                TokenKind::LBracket => {
                    let pos = self.advance().pos;
                    if self.at(TokenKind::Str) && self.lookahead(1).kind == TokenKind::RBracket {
                        let key = self.advance().text;
                        self.advance();
                        expr = Expr::new(
                            ExprKind::Field(FieldAccess {
                                base: Box::new(expr),
                                member: Member::Name(key),
                            }),
                            pos,
                        );
                    } else {
                        let index = self.expr()?;
                        self.consume(TokenKind::RBracket)?;
                        expr = Expr::new(
                            ExprKind::Index {
                                base: Box::new(expr),
                                index: Box::new(index),
                            },
                            pos,
                        );
                    }
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Argument list of a call whose name has already been consumed.
    fn call(&mut self, name: String) -> Result<Call, ParseError> {
        self.consume(TokenKind::LParen)?;
        let args = self.seq(TokenKind::RParen)?;
        Ok(Call { name, args })
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let tok = self.current().clone();
        let pos = tok.pos;
        let kind = match tok.kind {
            TokenKind::Int => {
                self.advance();
                let n = tok
                    .text
                    .parse::<i64>()
                    .map_err(|_| ParseError::new("64-bit integer", tok.describe(), pos))?;
                ExprKind::Int(n)
            }
            TokenKind::Str => {
                self.advance();
                ExprKind::Str(tok.text)
            }
            TokenKind::Name => {
                self.advance();
                match tok.text.as_str() {
                    "true" => ExprKind::Bool(true),
                    "false" => ExprKind::Bool(false),
                    "nil" => ExprKind::Nil,
                    _ if self.at(TokenKind::LParen) => ExprKind::Call(self.call(tok.text)?),
                    _ => ExprKind::Variable(tok.text),
                }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.expr()?;
                self.consume(TokenKind::RParen)?;
                return Ok(inner);
            }
            TokenKind::LBracket => {
                self.advance();
                ExprKind::List(self.seq(TokenKind::RBracket)?)
            }
            TokenKind::LBrace => {
                self.advance();
                ExprKind::Block(self.record_body()?)
            }
            _ => return Err(self.error("expression")),
        };
        Ok(Expr::new(kind, pos))
    }

    /// Elements after an opening `[` or `(`, through `close`.  Elements are
    /// separated by commas and/or newlines; line breaks and comments are
    /// kept as trivia.
    fn seq(&mut self, close: TokenKind) -> Result<Seq, ParseError> {
        let mut seq = Seq::default();
        loop {
            loop {
                let at = seq.items.len();
                match self.current().kind {
                    TokenKind::Comma => {}
                    TokenKind::NewLine => seq.trivia.push((at, Trivia::NewLine)),
                    TokenKind::Comment => {
                        let text = self.current().text.clone();
                        seq.trivia.push((at, Trivia::Comment(text)));
                    }
                    _ => break,
                }
                self.advance();
            }
            if self.at(close) {
                self.advance();
                return Ok(seq);
            }
            seq.items.push(self.expr()?);
            if !matches!(
                self.current().kind,
                TokenKind::NewLine | TokenKind::Comment | TokenKind::Comma
            ) && !self.at(close)
            {
                return Err(self.error(format!("',' or {close}")));
            }
        }
    }

    /// Record entries after `{`, through `}`.  Entries may be separated by
    /// commas as well as newlines.
    fn record_body(&mut self) -> Result<Block, ParseError> {
        let mut block = Block::new();
        loop {
            match self.current().kind {
                TokenKind::RBrace => {
                    self.advance();
                    return Ok(block);
                }
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::Eof => return Err(self.error("'}'")),
                _ => {
                    let stmt = self.statement()?;
                    let allowed = matches!(
                        stmt.kind,
                        StmtKind::NewLine
                            | StmtKind::Comment(_)
                            | StmtKind::FunctionDecl(_)
                            | StmtKind::Assign {
                                target: AssignTarget::Variable(_),
                                ..
                            }
                    );
                    if !allowed {
                        return Err(ParseError::new(
                            "record entry",
                            stmt.to_string(),
                            stmt.pos,
                        ));
                    }
                    block.push(stmt);
                }
            }
        }
    }
}

/// Convert a parsed field chain into an assignment target.  Only chains of
/// plain names rooted at a variable qualify.
fn assign_target(expr: &Expr) -> Option<AssignTarget> {
    fn walk(expr: &Expr, path: &mut Vec<String>) -> Option<String> {
        match &expr.kind {
            ExprKind::Variable(root) => Some(root.clone()),
            ExprKind::Field(FieldAccess {
                base,
                member: Member::Name(key),
            }) => {
                let root = walk(base, path)?;
                path.push(key.clone());
                Some(root)
            }
            _ => None,
        }
    }
    let mut path = Vec::new();
    let root = walk(expr, &mut path)?;
    if path.is_empty() {
        return None;
    }
    Some(AssignTarget::Field { root, path })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
