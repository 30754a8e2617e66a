//! This is the compiler as a library. See `src/bin` for the executable that
//! uses it.

pub mod common;
pub mod front;
pub mod middle;
pub mod back;

use common::{Diagnostic, Session};

/// Everything `compile` can fail with, split along the line the driver cares
/// about: diagnostics a user's source caused (exit code 2, spec §7) versus an
/// internal-consistency failure in the compiler itself (exit code 1, spec
/// §4.4/§7 — an `UndefinedLabel` should never occur if code generation is
/// correct, so it is never folded into the user-facing diagnostic list).
#[derive(Debug)]
pub enum CompileError {
    /// One or more diagnostics the error sink accumulated against the user's
    /// source (or, for a lex/parse failure, the single error that aborted
    /// that phase — neither has error recovery, spec §1 Non-goals).
    Diagnostics(Vec<Diagnostic>),
    /// The label resolver could not find a binding for a referenced label.
    Internal(Diagnostic),
}

/// Run the whole pipeline — lex, parse, semantic annotation, code
/// generation, label resolution (spec §2's dependency-ordered component
/// list) — over a complete Imp source string.
///
/// On success, returns the final, fully resolved VM-ASM text.
pub fn compile(source: &str) -> Result<String, CompileError> {
    let mut session = Session::new();

    let tokens = front::lex::Lexer::new(source).tokenize().map_err(|e| {
        CompileError::Diagnostics(vec![Diagnostic::Lex { message: e.to_string() }])
    })?;

    let ast = front::parse::parse(tokens, &mut session)
        .map_err(|e| CompileError::Diagnostics(vec![e]))?;

    middle::sema::annotate(&ast, &mut session);
    if !session.sink.is_empty() {
        return Err(CompileError::Diagnostics(session.sink.diagnostics()));
    }

    let generated = back::codegen::generate(&ast, &session);
    back::resolve::resolve(&generated).map_err(CompileError::Internal)
}
