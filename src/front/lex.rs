//! The token model and the lexer.

use std::cell::RefCell;
use std::rc::Rc;

use derive_more::Display;
use regex::Regex;

use crate::common::Id;

/// Token classes. Keywords and punctuation are listed in the order they
/// appear in the grammar; `Number`/`Identifier` carry a lexeme, the rest are
/// fixed spellings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum TokenKind {
    #[display("PROGRAM")]
    Program,
    #[display("PROCEDURE")]
    Procedure,
    #[display("IS")]
    Is,
    #[display("BEGIN")]
    Begin,
    #[display("END")]
    End,
    #[display("IF")]
    If,
    #[display("THEN")]
    Then,
    #[display("ELSE")]
    Else,
    #[display("ENDIF")]
    Endif,
    #[display("WHILE")]
    While,
    #[display("DO")]
    Do,
    #[display("ENDWHILE")]
    Endwhile,
    #[display("REPEAT")]
    Repeat,
    #[display("UNTIL")]
    Until,
    #[display("FOR")]
    For,
    #[display("ENDFOR")]
    Endfor,
    #[display("FROM")]
    From,
    #[display("TO")]
    To,
    #[display("DOWNTO")]
    Downto,
    #[display("READ")]
    Read,
    #[display("WRITE")]
    Write,
    #[display("T")]
    T,
    #[display(":=")]
    Assign,
    #[display("+")]
    Plus,
    #[display("-")]
    Minus,
    #[display("*")]
    Star,
    #[display("/")]
    Slash,
    #[display("%")]
    Percent,
    #[display(",")]
    Comma,
    #[display(":")]
    Colon,
    #[display(";")]
    Semicolon,
    #[display("(")]
    LParen,
    #[display(")")]
    RParen,
    #[display("[")]
    LBracket,
    #[display("]")]
    RBracket,
    #[display("=")]
    Eq,
    #[display("!=")]
    Neq,
    #[display(">")]
    Gt,
    #[display("<")]
    Lt,
    #[display(">=")]
    Gte,
    #[display("<=")]
    Lte,
    #[display("NUMBER")]
    Number,
    #[display("IDENTIFIER")]
    Identifier,
    #[display("EOF")]
    Eof,
    #[display("UNKNOWN")]
    Unknown,
}

/// The semantic role a token plays once semantic annotation has run. `Plain`
/// is the default before (and, for tokens never used as formal parameters,
/// after) annotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, Default)]
pub enum Role {
    #[default]
    #[display("PLAIN")]
    Plain,
    /// By-reference scalar parameter: the cell holds the caller's address.
    #[display("ARG")]
    Arg,
    /// By-reference array parameter: the cell holds the caller's element-zero
    /// address.
    #[display("T_ARG")]
    TArg,
    /// Procedure name: the cell holds the return address.
    #[display("PROC")]
    Proc,
}

pub type TokenRef = Rc<RefCell<Token>>;

/// A lexical token, annotated in place by the symbol table once semantic
/// analysis runs over the AST that references it.
#[derive(Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,

    /// Filled in by the symbol table's allocator. `None` until declared.
    pub address: Option<i64>,
    /// Whether this token may be the target of an assignment. `for` loop
    /// iterators are `false` while their body is being annotated.
    pub mutable: bool,
    pub role: Role,
    /// For `role == Proc` tokens: the procedure's formal parameters, in
    /// declaration order.
    pub formals: Vec<TokenRef>,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize, column: usize) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
            line,
            column,
            address: None,
            mutable: true,
            role: Role::Plain,
            formals: Vec::new(),
        }
    }

    pub fn shared(self) -> TokenRef {
        Rc::new(RefCell::new(self))
    }

    /// Parse this token's lexeme as a signed integer. Only valid for
    /// `TokenKind::Number` tokens.
    pub fn number_value(&self) -> i64 {
        self.lexeme
            .parse()
            .expect("NUMBER token lexeme must be a valid signed integer")
    }

    /// The interned identifier for this token's lexeme.
    pub fn id(&self) -> Id {
        Id::from(self.lexeme.clone())
    }

    /// Render one line of the `-t` token dump (spec §6's token print format).
    ///
    /// `-t` runs the lexer only and never calls semantic annotation (spec
    /// §6), so a freshly lexed token's `address`/`mutable`/`role` carry only
    /// their defaults, not real information. Rather than print those
    /// defaults as if they meant something, this always prints `addr=-
    /// mut=- role=-` — the format stays fixed-shape whether or not
    /// annotation has run, and a token that genuinely has been annotated
    /// (exercised directly by unit tests, never by the `-t` CLI path) prints
    /// its real fields via `display_line_annotated`.
    pub fn display_line(&self) -> String {
        format!(
            "kind={} lexeme='{}' line={} column={} addr=- mut=- role=-",
            self.kind, self.lexeme, self.line, self.column
        )
    }

    /// Render one line with real `address`/`mutable`/`role` fields, for a
    /// token that has actually gone through semantic annotation.
    pub fn display_line_annotated(&self) -> String {
        let addr = self
            .address
            .map(|a| a.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "kind={} lexeme='{}' line={} column={} addr={} mut={} role={}",
            self.kind, self.lexeme, self.line, self.column, addr, self.mutable, self.role
        )
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unexpected character {ch:?} at line {line}, column {column}")]
pub struct LexError {
    pub ch: char,
    pub line: usize,
    pub column: usize,
}

/// Keyword lexemes, checked before the generic identifier matcher so that
/// e.g. `WHILE` never lexes as an `Identifier`.
const KEYWORDS: &[(&str, TokenKind)] = &[
    ("PROGRAM", TokenKind::Program),
    ("PROCEDURE", TokenKind::Procedure),
    ("IS", TokenKind::Is),
    ("BEGIN", TokenKind::Begin),
    ("END", TokenKind::End),
    ("IF", TokenKind::If),
    ("THEN", TokenKind::Then),
    ("ELSE", TokenKind::Else),
    ("ENDIF", TokenKind::Endif),
    ("WHILE", TokenKind::While),
    ("DO", TokenKind::Do),
    ("ENDWHILE", TokenKind::Endwhile),
    ("REPEAT", TokenKind::Repeat),
    ("UNTIL", TokenKind::Until),
    ("FOR", TokenKind::For),
    ("ENDFOR", TokenKind::Endfor),
    ("FROM", TokenKind::From),
    ("TO", TokenKind::To),
    ("DOWNTO", TokenKind::Downto),
    ("READ", TokenKind::Read),
    ("WRITE", TokenKind::Write),
    ("T", TokenKind::T),
];

/// Multi-character operators are tried first so `<=` doesn't lex as `<`
/// followed by a stray `=`.
const OPERATORS: &[(&str, TokenKind)] = &[
    (":=", TokenKind::Assign),
    ("<=", TokenKind::Lte),
    (">=", TokenKind::Gte),
    ("!=", TokenKind::Neq),
    ("+", TokenKind::Plus),
    ("-", TokenKind::Minus),
    ("*", TokenKind::Star),
    ("/", TokenKind::Slash),
    ("%", TokenKind::Percent),
    (",", TokenKind::Comma),
    (":", TokenKind::Colon),
    (";", TokenKind::Semicolon),
    ("(", TokenKind::LParen),
    (")", TokenKind::RParen),
    ("[", TokenKind::LBracket),
    ("]", TokenKind::RBracket),
    ("=", TokenKind::Eq),
    (">", TokenKind::Gt),
    ("<", TokenKind::Lt),
];

pub struct Lexer<'input> {
    input: &'input str,
    pos: usize,
    line: usize,
    column: usize,
    whitespace: Regex,
    identifier: Regex,
    number: Regex,
}

impl<'input> Lexer<'input> {
    pub fn new(input: &'input str) -> Self {
        Lexer {
            input,
            pos: 0,
            line: 1,
            column: 1,
            whitespace: Regex::new(r"\A(?:[ \t\r\n]|#[^\n]*)*").unwrap(),
            identifier: Regex::new(r"\A[A-Za-z_][A-Za-z0-9_]*").unwrap(),
            number: Regex::new(r"\A[0-9]+").unwrap(),
        }
    }

    pub fn end_of_input(&self) -> bool {
        self.pos == self.input.len()
    }

    fn advance_position(&mut self, text: &str) {
        for ch in text.chars() {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.pos += text.len();
    }

    // Skip whitespace and `#`-to-end-of-line comments.
    fn skip_whitespace(&mut self) {
        if let Some(m) = self.whitespace.find(&self.input[self.pos..]) {
            let text = m.as_str().to_string();
            self.advance_position(&text);
        }
    }

    /// Get the next token, or `None` at end of input.
    pub fn next(&mut self) -> Result<Option<Token>, LexError> {
        self.skip_whitespace();
        if self.end_of_input() {
            return Ok(None);
        }

        let (line, column) = (self.line, self.column);
        let rest = &self.input[self.pos..];

        if let Some(m) = self.number.find(rest) {
            let text = m.as_str().to_string();
            self.advance_position(&text);
            return Ok(Some(Token::new(TokenKind::Number, text, line, column)));
        }

        if let Some(m) = self.identifier.find(rest) {
            let text = m.as_str().to_string();
            self.advance_position(&text);
            let kind = KEYWORDS
                .iter()
                .find(|(kw, _)| *kw == text)
                .map(|(_, k)| *k)
                .unwrap_or(TokenKind::Identifier);
            return Ok(Some(Token::new(kind, text, line, column)));
        }

        for (op, kind) in OPERATORS {
            if rest.starts_with(op) {
                self.advance_position(op);
                return Ok(Some(Token::new(*kind, *op, line, column)));
            }
        }

        let ch = rest.chars().next().unwrap();
        self.advance_position(&ch.to_string());
        Err(LexError { ch, line, column })
    }

    /// Collect the whole input into a vector of tokens, stopping at the
    /// first lexer error.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        while let Some(tok) = self.next()? {
            tokens.push(tok);
        }
        Ok(tokens)
    }
}
