//! Script lexer.
//!
//! Source text is decoded by code point so that non-ASCII comment text never
//! desynchronises column tracking.  Newlines are significant and become
//! [`TokenKind::NewLine`] tokens; spaces, tabs and carriage returns are
//! skipped.  Unrecognised input is a [`LexError`], never a silent EOF.

use std::fmt;

use super::error::{LexError, Position};

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Name,
    Int,
    /// Single-quoted string; `text` is the raw content between the quotes.
    Str,
    /// `// …` comment; `text` excludes the leading slashes and the newline.
    Comment,
    NewLine,

    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,

    Assign, // =
    Eq,     // ==
    Ne,     // !=
    Plus,
    Minus,
    Star,
    Slash,
    Comma,
    Dot,
    Gt,
    Ge,
    Lt,
    Le,

    Eof,
}

impl TokenKind {
    /// Fixed source text of a punctuation token, `None` for the
    /// variable-text kinds.
    pub fn symbol(self) -> Option<&'static str> {
        use TokenKind::*;
        Some(match self {
            LBrace => "{",
            RBrace => "}",
            LBracket => "[",
            RBracket => "]",
            LParen => "(",
            RParen => ")",
            Assign => "=",
            Eq => "==",
            Ne => "!=",
            Plus => "+",
            Minus => "-",
            Star => "*",
            Slash => "/",
            Comma => ",",
            Dot => ".",
            Gt => ">",
            Ge => ">=",
            Lt => "<",
            Le => "<=",
            Name | Int | Str | Comment | NewLine | Eof => return None,
        })
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.symbol() {
            Some(s) => write!(f, "'{s}'"),
            None => f.write_str(match self {
                TokenKind::Name => "name",
                TokenKind::Int => "integer",
                TokenKind::Str => "string",
                TokenKind::Comment => "comment",
                TokenKind::NewLine => "newline",
                _ => "EOF",
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub pos: Position,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, pos: Position) -> Self {
        Token {
            kind,
            text: text.into(),
            pos,
        }
    }

    /// Human-readable form used in parse errors.
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Name => format!("name `{}`", self.text),
            TokenKind::Int => format!("integer {}", self.text),
            TokenKind::Str => format!("string '{}'", self.text),
            kind => kind.to_string(),
        }
    }

    /// Source text that reproduces this token when lexed again.
    pub fn source_text(&self) -> String {
        match self.kind {
            TokenKind::Str => format!("'{}'", self.text),
            TokenKind::Comment => format!("//{}", self.text),
            TokenKind::NewLine => "\n".to_owned(),
            TokenKind::Eof => String::new(),
            _ => self.text.clone(),
        }
    }
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

pub struct Lexer {
    src: Vec<char>,
    idx: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(src: &str) -> Self {
        Lexer {
            src: src.chars().collect(),
            idx: 0,
            line: 1,
            col: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src.get(self.idx).copied()
    }

    fn pos(&self) -> Position {
        Position::new(self.line, self.col)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.idx += 1;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\r')) {
            self.advance();
        }
    }

    fn take_while(&mut self, mut pred: impl FnMut(char) -> bool) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            s.push(c);
            self.advance();
        }
        s
    }

    fn read_string(&mut self, start: Position) -> Result<Token, LexError> {
        let mut s = String::new();
        loop {
            match self.advance() {
                None => return Err(LexError::UnterminatedString { pos: start }),
                Some('\\') => {
                    s.push('\\');
                    match self.advance() {
                        Some(c) => s.push(c),
                        None => return Err(LexError::UnterminatedString { pos: start }),
                    }
                }
                Some('\'') => break,
                Some(c) => s.push(c),
            }
        }
        Ok(Token::new(TokenKind::Str, s, start))
    }

    /// Produce the next token.  Once the input is exhausted every further call
    /// returns an `Eof` token.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_ws();
        let start = self.pos();
        let Some(ch) = self.peek() else {
            return Ok(Token::new(TokenKind::Eof, "", start));
        };

        if ch.is_ascii_digit() {
            let text = self.take_while(|c| c.is_ascii_digit());
            if text.parse::<i64>().is_err() {
                return Err(LexError::IntegerOverflow { text, pos: start });
            }
            return Ok(Token::new(TokenKind::Int, text, start));
        }
        if ch.is_ascii_alphabetic() || ch == '_' {
            let text = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
            return Ok(Token::new(TokenKind::Name, text, start));
        }

        self.advance();
        let kind = match ch {
            '\n' => return Ok(Token::new(TokenKind::NewLine, "\n", start)),
            '\'' => return self.read_string(start),
            '/' if self.peek() == Some('/') => {
                self.advance();
                let mut text = self.take_while(|c| c != '\n');
                if text.ends_with('\r') {
                    text.pop();
                }
                return Ok(Token::new(TokenKind::Comment, text, start));
            }
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            '=' if self.eat('=') => TokenKind::Eq,
            '=' => TokenKind::Assign,
            '!' if self.eat('=') => TokenKind::Ne,
            '>' if self.eat('=') => TokenKind::Ge,
            '>' => TokenKind::Gt,
            '<' if self.eat('=') => TokenKind::Le,
            '<' => TokenKind::Lt,
            c => return Err(LexError::UnexpectedChar { ch: c, pos: start }),
        };
        let text = kind.symbol().unwrap_or_default();
        Ok(Token::new(kind, text, start))
    }
}

/// Lex a whole source string.  The returned vector always ends with exactly
/// one `Eof` token.
pub fn tokenize(src: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer::new(src);
    let mut tokens = Vec::new();
    loop {
        let tok = lexer.next_token()?;
        let done = tok.kind == TokenKind::Eof;
        tokens.push(tok);
        if done {
            return Ok(tokens);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn assignment_tokens() {
        use TokenKind::*;
        assert_eq!(kinds("a = 1 + 2"), vec![Name, Assign, Int, Plus, Int, Eof]);
    }

    #[test]
    fn two_char_operators() {
        use TokenKind::*;
        assert_eq!(
            kinds("== != >= <= > < ="),
            vec![Eq, Ne, Ge, Le, Gt, Lt, Assign, Eof]
        );
    }

    #[test]
    fn newlines_are_tokens() {
        use TokenKind::*;
        assert_eq!(kinds("a\r\n\nb"), vec![Name, NewLine, NewLine, Name, Eof]);
    }

    #[test]
    fn comment_runs_to_end_of_line() {
        let toks = tokenize("// GET /users 列表\nx").unwrap();
        assert_eq!(toks[0].kind, TokenKind::Comment);
        assert_eq!(toks[0].text, " GET /users 列表");
        assert_eq!(toks[1].kind, TokenKind::NewLine);
        assert_eq!(toks[2].pos, Position::new(2, 1));
    }

    #[test]
    fn comment_ends_only_at_line_feed() {
        let toks = tokenize("// a\r\nx").unwrap();
        assert_eq!(toks[0].text, " a");
        assert_eq!(toks[1].kind, TokenKind::NewLine);
        assert_eq!(toks[2].kind, TokenKind::Name);

        let toks = tokenize("f() { // c\r}\n").unwrap();
        let comment = toks.iter().find(|t| t.kind == TokenKind::Comment).unwrap();
        assert_eq!(comment.text, " c\r}");
        assert!(!toks.iter().any(|t| t.kind == TokenKind::RBrace));
    }

    #[test]
    fn comment_at_eof() {
        let toks = tokenize("x // trailing").unwrap();
        assert_eq!(toks[1].kind, TokenKind::Comment);
        assert_eq!(toks[2].kind, TokenKind::Eof);
    }

    #[test]
    fn columns_count_code_points() {
        let toks = tokenize("'héllo' x").unwrap();
        assert_eq!(toks[0].text, "héllo");
        assert_eq!(toks[1].pos, Position::new(1, 9));
    }

    #[test]
    fn string_keeps_escaped_quote_raw() {
        let toks = tokenize(r"'it\'s'").unwrap();
        assert_eq!(toks[0].kind, TokenKind::Str);
        assert_eq!(toks[0].text, r"it\'s");
    }

    #[test]
    fn string_may_span_lines() {
        let toks = tokenize("'a\nb' c").unwrap();
        assert_eq!(toks[0].text, "a\nb");
        assert_eq!(toks[1].pos, Position::new(2, 4));
    }

    #[test]
    fn identifiers_allow_digits_after_first() {
        let toks = tokenize("user_2 _x").unwrap();
        assert_eq!(toks[0].text, "user_2");
        assert_eq!(toks[1].text, "_x");
    }

    #[test]
    fn unterminated_string_is_error() {
        let err = tokenize("a = 'oops").unwrap_err();
        assert_eq!(
            err,
            LexError::UnterminatedString {
                pos: Position::new(1, 5)
            }
        );
    }

    #[test]
    fn unknown_char_is_error() {
        let err = tokenize("a = 1 # x").unwrap_err();
        assert_eq!(
            err,
            LexError::UnexpectedChar {
                ch: '#',
                pos: Position::new(1, 7)
            }
        );
        assert!(matches!(
            tokenize("!").unwrap_err(),
            LexError::UnexpectedChar { ch: '!', .. }
        ));
    }

    #[test]
    fn oversized_integer_is_error() {
        assert!(matches!(
            tokenize("99999999999999999999").unwrap_err(),
            LexError::IntegerOverflow { .. }
        ));
    }

    #[test]
    fn eof_is_sticky() {
        let mut lx = Lexer::new("x");
        assert_eq!(lx.next_token().unwrap().kind, TokenKind::Name);
        assert_eq!(lx.next_token().unwrap().kind, TokenKind::Eof);
        assert_eq!(lx.next_token().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn source_text_round_trip() {
        let src = "h = {'X-Id' = 1}\n// note\nf(a, b)";
        let mut rebuilt = String::new();
        for tok in tokenize(src).unwrap() {
            rebuilt.push_str(&tok.source_text());
            if tok.kind != TokenKind::Comment {
                rebuilt.push(' ');
            }
        }
        let again: Vec<_> = tokenize(&rebuilt)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect();
        let orig: Vec<_> = tokenize(src)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect();
        assert_eq!(again, orig);
    }
}
