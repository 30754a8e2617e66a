//! Semantic annotation: the single pass that declares every name, resolves
//! every use, assigns addresses, and validates procedure-call arity/kind
//! compatibility (spec §4.2's `PROC_CALL`/`PROC_CALL_COMMAND` rules) before
//! code generation runs. Splitting this out of the emitter keeps emission a
//! pure read-only walk (spec §4.2's "Public contract").
//!
//! Errors are reported to `session.sink` and do not abort the walk — this
//! mirrors spec §7's "best-effort continuation" propagation policy.

use crate::common::{Diagnostic, Session};
use crate::front::ast::{Node, NodeKind};
use crate::front::lex::Role;
use crate::middle::symtab::SymbolTable;

const MAIN_SCOPE: &str = "main";

pub fn annotate(root: &Node, session: &mut Session) -> SymbolTable {
    let mut symtab = SymbolTable::new();
    let procedures = &root.children[0];
    let main = &root.children[1];

    collect_proc_headers(procedures, &mut symtab, session);
    annotate_proc_bodies(procedures, &mut symtab, session);

    let commands = main.children.last().expect("MAIN always has a commands child");
    if let Some(decl) = &main.declarations {
        annotate_declarations(decl, MAIN_SCOPE, &mut symtab, session);
    }
    annotate_commands(commands, MAIN_SCOPE, &mut symtab, session);

    symtab
}

/// Walk the left-recursive `PROCEDURES` cons-list in source order (oldest
/// first, via `children[0]` recursion) declaring every procedure's name and
/// formals before any body is annotated, so a procedure may call one
/// declared later in the source.
fn collect_proc_headers(node: &Node, symtab: &mut SymbolTable, session: &mut Session) {
    if node.children.is_empty() {
        return;
    }
    collect_proc_headers(&node.children[0], symtab, session);

    let proc_head = &node.children[1];
    let name_tok = proc_head.anchor().clone();
    let args_decl = &proc_head.children[0];
    name_tok.borrow_mut().formals = args_decl.extra_tokens.clone();

    if let Err(diag) = symtab.declare_proc(&name_tok, session) {
        session.sink.report(diag);
    }
}

fn annotate_proc_bodies(node: &Node, symtab: &mut SymbolTable, session: &mut Session) {
    if node.children.is_empty() {
        return;
    }
    annotate_proc_bodies(&node.children[0], symtab, session);

    let proc_head = &node.children[1];
    let commands = &node.children[2];

    let scope = proc_head.anchor().borrow().lexeme.clone();
    let args_decl = &proc_head.children[0];
    for formal in &args_decl.extra_tokens {
        if let Err(diag) = symtab.declare_formal(&scope, formal, session) {
            session.sink.report(diag);
        }
    }
    if let Some(decl) = &node.declarations {
        annotate_declarations(decl, &scope, symtab, session);
    }
    annotate_commands(commands, &scope, symtab, session);
}

fn annotate_declarations(node: &Node, scope: &str, symtab: &mut SymbolTable, session: &mut Session) {
    for decl in &node.children {
        match decl.kind {
            NodeKind::DeclareScalar => {
                let tok = decl.anchor();
                if let Err(diag) = symtab.declare_scalar(scope, tok, session) {
                    session.sink.report(diag);
                }
            }
            NodeKind::DeclareArray => {
                let tok = decl.anchor();
                let lo = decl.extra_tokens[0].borrow().number_value();
                let hi = decl.extra_tokens[1].borrow().number_value();
                if let Err(diag) = symtab.declare_array(scope, tok, lo, hi, session) {
                    session.sink.report(diag);
                }
            }
            _ => unreachable!("DECLARATIONS children are always DeclareScalar/DeclareArray"),
        }
    }
}

fn annotate_commands(node: &Node, scope: &str, symtab: &mut SymbolTable, session: &mut Session) {
    for command in &node.children {
        annotate_command(command, scope, symtab, session);
    }
}

fn annotate_command(node: &Node, scope: &str, symtab: &mut SymbolTable, session: &mut Session) {
    match node.kind {
        NodeKind::AssignmentCommand => {
            annotate_lvalue(&node.children[0], scope, symtab, session);
            annotate_expression(&node.children[1], scope, symtab, session);
        }
        NodeKind::IfCommand => {
            annotate_condition(&node.children[0], scope, symtab, session);
            annotate_commands(&node.children[1], scope, symtab, session);
        }
        NodeKind::IfElseCommand => {
            annotate_condition(&node.children[0], scope, symtab, session);
            annotate_commands(&node.children[1], scope, symtab, session);
            annotate_commands(&node.children[2], scope, symtab, session);
        }
        NodeKind::WhileCommand => {
            annotate_condition(&node.children[0], scope, symtab, session);
            annotate_commands(&node.children[1], scope, symtab, session);
        }
        NodeKind::RepeatCommand => {
            annotate_commands(&node.children[0], scope, symtab, session);
            annotate_condition(&node.children[1], scope, symtab, session);
        }
        NodeKind::ForToCommand | NodeKind::ForDownToCommand => {
            annotate_value(&node.children[0], scope, symtab, session);
            annotate_value(&node.children[1], scope, symtab, session);

            let iter_tok = node.anchor();
            let name = iter_tok.borrow().lexeme.clone();
            if !symtab.contains(scope, &name) {
                if let Err(diag) = symtab.declare_scalar(scope, iter_tok, session) {
                    session.sink.report(diag);
                }
            } else if let Err(diag) = symtab.lookup(scope, iter_tok) {
                session.sink.report(diag);
            }
            symtab.set_mutable(scope, &name, false);
            annotate_commands(&node.children[2], scope, symtab, session);
            symtab.set_mutable(scope, &name, true);
            // Restore the iterator token's own view too, in case later code
            // re-reads `iter_tok.mutable` directly.
            iter_tok.borrow_mut().mutable = true;
        }
        NodeKind::ReadCommand => {
            annotate_lvalue(&node.children[0], scope, symtab, session);
        }
        NodeKind::WriteCommand => {
            annotate_value(&node.children[0], scope, symtab, session);
        }
        NodeKind::ProcCallCommand => {
            annotate_proc_call(&node.children[0], scope, symtab, session);
        }
        _ => unreachable!("not a command kind: {:?}", node.kind),
    }
}

/// An assignment's or read's write-target: an `IDENTIFIER` or `TABLE` node
/// (never `VALUE`-wrapped — see `Parser::identifier_ref`). Enforces
/// `IMMUTABLE_WRITE` once the symbol's mutability is known.
fn annotate_lvalue(node: &Node, scope: &str, symtab: &mut SymbolTable, session: &mut Session) {
    match node.kind {
        NodeKind::Identifier => {
            let tok = node.anchor();
            if let Err(diag) = symtab.lookup(scope, tok) {
                session.sink.report(diag);
            } else if !tok.borrow().mutable {
                let t = tok.borrow();
                session.sink.report(Diagnostic::ImmutableWrite {
                    lexeme: t.lexeme.clone(),
                    line: t.line,
                });
            }
        }
        NodeKind::Table => {
            let tok = node.anchor();
            if let Err(diag) = symtab.lookup(scope, tok) {
                session.sink.report(diag);
            } else if !tok.borrow().mutable {
                let t = tok.borrow();
                session.sink.report(Diagnostic::ImmutableWrite {
                    lexeme: t.lexeme.clone(),
                    line: t.line,
                });
            }
            annotate_index(&node.children[0], scope, symtab, session);
        }
        _ => unreachable!("lvalue must be IDENTIFIER or TABLE"),
    }
}

/// An array index: either a bare identifier or a (possibly negative) literal
/// (see `Parser::index_value`) — never `VALUE`-wrapped.
fn annotate_index(node: &Node, scope: &str, symtab: &mut SymbolTable, session: &mut Session) {
    match node.kind {
        NodeKind::Number => intern_literal(node, session),
        NodeKind::Identifier => {
            if let Err(diag) = symtab.lookup(scope, node.anchor()) {
                session.sink.report(diag);
            }
        }
        _ => unreachable!("array index must be NUMBER or IDENTIFIER"),
    }
}

fn intern_literal(node: &Node, session: &mut Session) {
    let tok = node.anchor();
    let value = tok.borrow().number_value();
    let address = session.intern_number(value);
    tok.borrow_mut().address = Some(address);
}

/// A `VALUE` node's single child: `NUMBER`, `IDENTIFIER`, or `TABLE`.
fn annotate_value(node: &Node, scope: &str, symtab: &mut SymbolTable, session: &mut Session) {
    let inner = &node.children[0];
    match inner.kind {
        NodeKind::Number => intern_literal(inner, session),
        NodeKind::Identifier => {
            if let Err(diag) = symtab.lookup(scope, inner.anchor()) {
                session.sink.report(diag);
            }
        }
        NodeKind::Table => {
            if let Err(diag) = symtab.lookup(scope, inner.anchor()) {
                session.sink.report(diag);
            }
            annotate_index(&inner.children[0], scope, symtab, session);
        }
        _ => unreachable!("VALUE's child must be NUMBER/IDENTIFIER/TABLE"),
    }
}

fn annotate_expression(node: &Node, scope: &str, symtab: &mut SymbolTable, session: &mut Session) {
    for value in &node.children {
        annotate_value(value, scope, symtab, session);
    }
}

fn annotate_condition(node: &Node, scope: &str, symtab: &mut SymbolTable, session: &mut Session) {
    annotate_value(&node.children[0], scope, symtab, session);
    annotate_value(&node.children[1], scope, symtab, session);
}

/// Which shape a by-value-or-by-reference actual/formal resolves to, for the
/// role-compatibility check in spec §4.2.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum ArgShape {
    PlainScalar,
    PlainArray,
    RefScalar,
    RefArray,
}

fn shape_of(role: Role, is_array: bool) -> ArgShape {
    match (role, is_array) {
        (Role::Arg, _) => ArgShape::RefScalar,
        (Role::TArg, _) => ArgShape::RefArray,
        (_, true) => ArgShape::PlainArray,
        (_, false) => ArgShape::PlainScalar,
    }
}

fn annotate_proc_call(node: &Node, scope: &str, symtab: &mut SymbolTable, session: &mut Session) {
    let callee_tok = node.anchor();
    let name = callee_tok.borrow().lexeme.clone();
    let line = callee_tok.borrow().line;

    let Some(callee) = symtab.lookup_proc(&name) else {
        session.sink.report(Diagnostic::Undeclared {
            lexeme: name,
            line,
        });
        return;
    };
    {
        let mut t = callee_tok.borrow_mut();
        t.address = Some(callee.address);
        t.role = Role::Proc;
        t.formals = callee.formals.clone();
    }

    let args_node = &node.children[0];
    let actuals = &args_node.extra_tokens;

    if actuals.len() != callee.formals.len() {
        session.sink.report(Diagnostic::ArgCount {
            lexeme: name.clone(),
            line,
        });
        // Still resolve whichever actuals we can, best-effort.
    }

    for actual in actuals.iter() {
        if let Err(diag) = symtab.lookup(scope, actual) {
            session.sink.report(diag);
        }
    }

    for (formal, actual) in callee.formals.iter().zip(actuals.iter()) {
        let formal_role = formal.borrow().role;
        let formal_is_array = formal.borrow().role == Role::TArg;
        let actual_symbol = symtab.lookup_symbol(scope, &actual.borrow().lexeme);
        let Some(actual_symbol) = actual_symbol else {
            continue; // already reported Undeclared above
        };
        let formal_shape = shape_of(formal_role, formal_is_array);
        let actual_shape = shape_of(actual_symbol.role, actual_symbol.is_array);

        let compatible = match formal_shape {
            ArgShape::RefScalar => {
                matches!(actual_shape, ArgShape::PlainScalar | ArgShape::RefScalar)
            }
            ArgShape::RefArray => {
                matches!(actual_shape, ArgShape::RefArray | ArgShape::PlainArray)
            }
            _ => unreachable!("formal parameters are always ARG or T_ARG"),
        };
        if !compatible {
            let t = actual.borrow();
            session.sink.report(Diagnostic::ArgKind {
                lexeme: t.lexeme.clone(),
                line: t.line,
            });
        }
    }
}
