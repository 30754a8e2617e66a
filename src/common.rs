//! Common definitions that are shared between different parts of the compiler.

use std::sync::{Arc, Mutex};

/// Interned identifiers. Two identifiers with the same spelling intern to the
/// same value, so equality is a pointer comparison.
pub type Id = internment::Intern<String>;

/// Reserved scratch cells. Never assigned to a user symbol.
pub const R1: i64 = 1;
pub const R2: i64 = 2;
pub const R3: i64 = 3;
pub const R4: i64 = 4;
pub const R5: i64 = 5;
pub const R6: i64 = 6;
pub const R7: i64 = 7;
pub const R8: i64 = 8;

/// First address available to user declarations and literals.
pub const BASE: i64 = 10;

/// A single diagnostic, matching the `ERROR: <message> - '<lexeme>' on line: <n>`
/// / `ERROR: <message>` formats from the spec.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Diagnostic {
    #[error("ERROR: undeclared identifier - '{lexeme}' on line: {line}")]
    Undeclared { lexeme: String, line: usize },
    #[error("ERROR: identifier already declared in this scope - '{lexeme}' on line: {line}")]
    Redeclared { lexeme: String, line: usize },
    #[error("ERROR: array upper bound is lower than lower bound - '{lexeme}' on line: {line}")]
    BadRange { lexeme: String, line: usize },
    #[error("ERROR: cannot assign to an immutable variable - '{lexeme}' on line: {line}")]
    ImmutableWrite { lexeme: String, line: usize },
    #[error("ERROR: wrong number of arguments in call - '{lexeme}' on line: {line}")]
    ArgCount { lexeme: String, line: usize },
    #[error("ERROR: argument kind does not match the formal parameter - '{lexeme}' on line: {line}")]
    ArgKind { lexeme: String, line: usize },
    #[error("ERROR: {message}")]
    Lex { message: String },
    #[error("ERROR: {message}")]
    Parse { message: String },
    /// Internal-consistency failure raised by the label resolver (spec §4.4,
    /// §7). Never pushed to the sink: unlike every other variant, this one is
    /// returned directly as a hard `Err` and aborts the driver before it ever
    /// reaches the "print accumulated diagnostics" path.
    #[error("ERROR: undefined label - '{label}'")]
    UndefinedLabel { label: String },
}

/// A process-wide, mutex-guarded, append-only collector of diagnostics.
///
/// Cloning an `ErrorSink` shares the same underlying list, so every phase of a
/// compilation (and, if this were ever embedded in a multi-threaded host,
/// concurrent compilations) can hold a handle and append to it.
#[derive(Clone, Default)]
pub struct ErrorSink(Arc<Mutex<Vec<Diagnostic>>>);

impl ErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, diagnostic: Diagnostic) {
        self.0.lock().unwrap().push(diagnostic);
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().unwrap().is_empty()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.0.lock().unwrap().clone()
    }
}

/// The per-compilation context: the error sink, the address allocator, the
/// literal pool, and the node-id counter. Every phase receives a mutable
/// borrow of a `Session` instead of touching global state.
pub struct Session {
    pub sink: ErrorSink,
    next_address: i64,
    next_node_id: i64,
    /// Distinct literal values, in first-seen order, paired with the address
    /// allocated to hold them. `PROGRAM_ALL`'s prologue walks this in order to
    /// emit exactly one `SET v; STORE a` per distinct literal.
    literals: Vec<(i64, i64)>,
}

impl Session {
    pub fn new() -> Self {
        Session {
            sink: ErrorSink::new(),
            next_address: BASE,
            next_node_id: 0,
            literals: Vec::new(),
        }
    }

    /// Allocate `width` contiguous fresh addresses and return the first one.
    pub fn alloc(&mut self, width: i64) -> i64 {
        let addr = self.next_address;
        self.next_address += width;
        addr
    }

    pub fn next_node_id(&mut self) -> i64 {
        let id = self.next_node_id;
        self.next_node_id += 1;
        id
    }

    /// Allocate one cell for `value` if it hasn't been seen before, and return
    /// its address either way.
    pub fn intern_number(&mut self, value: i64) -> i64 {
        if let Some((_, addr)) = self.literals.iter().find(|(v, _)| *v == value) {
            return *addr;
        }
        let addr = self.alloc(1);
        self.literals.push((value, addr));
        addr
    }

    /// Every distinct literal observed so far, in first-seen order.
    pub fn literals(&self) -> &[(i64, i64)] {
        &self.literals
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
