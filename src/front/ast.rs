//! The abstract syntax tree: a closed tagged variant instead of the
//! class-per-kind virtual dispatch the original implementation used (see
//! DESIGN.md). Each node carries a kind tag, an optional anchor token, a
//! unique node id used to generate label names, an ordered child list, and
//! (for certain kinds) an auxiliary token list.

use crate::front::lex::TokenRef;

/// The closed set of AST node kinds. Declarations get their own kinds
/// (`DeclareScalar`/`DeclareArray`) rather than a single generic
/// `Declaration`, since a scalar declaration carries no bounds and an array
/// declaration carries two (in `extra_tokens`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    ProgramAll,
    Procedures,
    ProcHead,
    ArgsDecl,
    Declarations,
    DeclareScalar,
    DeclareArray,
    Main,
    Commands,
    AssignmentCommand,
    IfCommand,
    IfElseCommand,
    WhileCommand,
    RepeatCommand,
    ForToCommand,
    ForDownToCommand,
    ProcCallCommand,
    ProcCall,
    Args,
    ReadCommand,
    WriteCommand,
    Expression,
    Condition,
    Value,
    Number,
    Identifier,
    Table,
}

/// An AST node. The root exclusively owns the whole tree; every node
/// exclusively owns its children. Tokens are shared, non-owning references
/// into the token pool, which outlives the tree.
#[derive(Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub anchor: Option<TokenRef>,
    pub id: i64,
    pub children: Vec<Node>,
    pub extra_tokens: Vec<TokenRef>,
    /// `PROCEDURES`' and `MAIN`'s optional `DECLARATIONS` child. A dedicated
    /// field rather than a conditionally-pushed trailing `children` entry, so
    /// "no declarations" is `None` rather than a length-based sentinel.
    pub declarations: Option<Box<Node>>,
}

impl Node {
    pub fn new(kind: NodeKind, id: i64) -> Self {
        Node {
            kind,
            anchor: None,
            id,
            children: Vec::new(),
            extra_tokens: Vec::new(),
            declarations: None,
        }
    }

    pub fn with_anchor(mut self, anchor: TokenRef) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    pub fn with_extra_tokens(mut self, tokens: Vec<TokenRef>) -> Self {
        self.extra_tokens = tokens;
        self
    }

    pub fn with_declarations(mut self, declarations: Option<Node>) -> Self {
        self.declarations = declarations.map(Box::new);
        self
    }

    pub fn anchor(&self) -> &TokenRef {
        self.anchor
            .as_ref()
            .expect("node of this kind must carry an anchor token")
    }
}
