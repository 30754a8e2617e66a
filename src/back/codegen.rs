//! The AST walker / code generator (spec §4.2/§4.3).
//!
//! Emission is a pure read of the tree and the addresses semantic annotation
//! already assigned (`middle::sema::annotate` has run by the time `generate`
//! is called) — no node or token is mutated here. Every expression leaves
//! its value in `R4`; every condition leaves `1`/`0` in `R4`.
//!
//! Labels are emitted as `*NAME ` prefixes inline and resolved by
//! `back::resolve` afterwards; nothing in this module computes a numeric
//! jump distance by hand except the condition decode's fixed `+3`/`+2` shape
//! (spec §4.2), which — unlike the `*`/`/`/`%` expansions — does not depend
//! on the length of any recursively emitted child code, so a literal
//! relative offset is safe there (see DESIGN.md).

use crate::common::{Session, R1, R2, R3, R4, R5, R6, R7, R8};
use crate::front::ast::{Node, NodeKind};
use crate::front::lex::Role;

pub fn generate(root: &Node, session: &Session) -> String {
    let mut out = String::new();
    build_program_all(root, session, &mut out);
    out
}

fn lbl(prefix: &str, id: i64) -> String {
    format!("{prefix}_{id}")
}

fn op0(out: &mut String, op: &str) {
    out.push_str(op);
    out.push('\n');
}

fn instr(out: &mut String, op: &str, operand: i64) {
    out.push_str(op);
    out.push(' ');
    out.push_str(&operand.to_string());
    out.push('\n');
}

fn jump_label(out: &mut String, op: &str, label: &str) {
    out.push_str(op);
    out.push_str(" *");
    out.push_str(label);
    out.push('\n');
}

fn label_def(out: &mut String, label: &str) {
    out.push('*');
    out.push_str(label);
    out.push(' ');
}

fn set_rel(out: &mut String, n: i64) {
    out.push_str("SET &");
    out.push_str(&n.to_string());
    out.push('\n');
}

fn addr(node: &Node) -> i64 {
    node.anchor()
        .borrow()
        .address
        .expect("every referenced identifier/number must carry an address at emission time")
}

fn role(node: &Node) -> Role {
    node.anchor().borrow().role
}

// PROGRAM_ALL (root). Children: [procedures, main].
fn build_program_all(node: &Node, session: &Session, out: &mut String) {
    instr(out, "SET", 1);
    instr(out, "STORE", R6);
    op0(out, "HALF");
    instr(out, "STORE", R5);
    for (value, address) in session.literals() {
        instr(out, "SET", *value);
        instr(out, "STORE", *address);
    }
    jump_label(out, "JUMP", "MAIN");
    build_procedures(&node.children[0], session, out);
    label_def(out, "MAIN");
    build_main(&node.children[1], session, out);
    op0(out, "HALT");
}

// PROCEDURES: left-recursive cons-list, children [procedures', proc_head, commands] or [],
// plus an optional `declarations` field (codegen never reads it — declarations
// carry no code, only addresses sema already assigned).
fn build_procedures(node: &Node, session: &Session, out: &mut String) {
    if node.children.is_empty() {
        return;
    }
    build_procedures(&node.children[0], session, out);

    let proc_head = &node.children[1];
    let commands = &node.children[2];
    let name_tok = proc_head.anchor();
    let proc_name = name_tok.borrow().lexeme.clone();
    let return_slot = name_tok
        .borrow()
        .address
        .expect("procedure name must have an allocated return-address cell");

    label_def(out, &format!("PROC_{proc_name}"));
    build_commands(commands, session, out);
    instr(out, "RTRN", return_slot);
}

// MAIN: children [commands], plus an optional `declarations` field (unread here
// for the same reason as PROCEDURES above).
fn build_main(node: &Node, session: &Session, out: &mut String) {
    let commands = node.children.last().expect("MAIN always has a commands child");
    build_commands(commands, session, out);
}

fn build_commands(node: &Node, session: &Session, out: &mut String) {
    for command in &node.children {
        build_command(command, session, out);
    }
}

fn build_command(node: &Node, session: &Session, out: &mut String) {
    match node.kind {
        NodeKind::AssignmentCommand => build_assignment(node, session, out),
        NodeKind::IfCommand => build_if(node, session, out),
        NodeKind::IfElseCommand => build_if_else(node, session, out),
        NodeKind::WhileCommand => build_while(node, session, out),
        NodeKind::RepeatCommand => build_repeat(node, session, out),
        NodeKind::ForToCommand => build_for_to(node, session, out),
        NodeKind::ForDownToCommand => build_for_downto(node, session, out),
        NodeKind::ReadCommand => build_read(node, session, out),
        NodeKind::WriteCommand => build_write(node, session, out),
        NodeKind::ProcCallCommand => build_proc_call(&node.children[0], session, out),
        other => unreachable!("not a command kind: {other:?}"),
    }
}

// ASSIGNMENT_COMMAND: [lvalue, rvalue]. Four cases by lvalue.kind x lvalue.role.
fn build_assignment(node: &Node, session: &Session, out: &mut String) {
    let lvalue = &node.children[0];
    let rvalue = &node.children[1];

    match lvalue.kind {
        NodeKind::Identifier => match role(lvalue) {
            Role::Plain => {
                build_expression(rvalue, session, out);
                instr(out, "LOAD", R4);
                instr(out, "STORE", addr(lvalue));
            }
            Role::Arg => {
                build_expression(rvalue, session, out);
                instr(out, "LOAD", addr(lvalue));
                instr(out, "STORE", R3);
                instr(out, "LOAD", R4);
                instr(out, "STOREI", R3);
            }
            other => unreachable!("scalar lvalue has unexpected role {other:?}"),
        },
        NodeKind::Table => {
            let index = &lvalue.children[0];
            match role(lvalue) {
                Role::Plain => {
                    build_expression(rvalue, session, out);
                    instr(out, "LOAD", R4);
                    instr(out, "STORE", R1);
                    build_index(index, out);
                    instr(out, "SET", addr(lvalue));
                    instr(out, "ADD", R4);
                    instr(out, "STORE", R3);
                    instr(out, "LOAD", R1);
                    instr(out, "STOREI", R3);
                }
                Role::TArg => {
                    build_index(index, out);
                    instr(out, "LOAD", addr(lvalue));
                    instr(out, "ADD", R4);
                    instr(out, "STORE", R3);
                    build_expression(rvalue, session, out);
                    instr(out, "LOAD", R4);
                    instr(out, "STOREI", R3);
                }
                other => unreachable!("array lvalue has unexpected role {other:?}"),
            }
        }
        other => unreachable!("lvalue must be IDENTIFIER or TABLE, got {other:?}"),
    }
}

// An array index: NUMBER or IDENTIFIER, evaluated directly into R4 (same
// shape as the NUMBER/IDENTIFIER rules of VALUE, reused verbatim here since
// `Parser::index_value` never wraps the index in a VALUE node).
fn build_index(node: &Node, out: &mut String) {
    match node.kind {
        NodeKind::Number => {
            instr(out, "LOAD", addr(node));
            instr(out, "STORE", R4);
        }
        NodeKind::Identifier => match role(node) {
            Role::Plain => {
                instr(out, "LOAD", addr(node));
                instr(out, "STORE", R4);
            }
            Role::Arg => {
                instr(out, "LOADI", addr(node));
                instr(out, "STORE", R4);
            }
            other => unreachable!("index identifier has unexpected role {other:?}"),
        },
        other => unreachable!("array index must be NUMBER or IDENTIFIER, got {other:?}"),
    }
}

// VALUE: single child, NUMBER | IDENTIFIER | TABLE.
fn build_value(node: &Node, session: &Session, out: &mut String) {
    build_value_inner(&node.children[0], session, out);
}

fn build_value_inner(node: &Node, session: &Session, out: &mut String) {
    match node.kind {
        NodeKind::Number | NodeKind::Identifier => build_index(node, out),
        NodeKind::Table => {
            build_index(&node.children[0], out);
            match role(node) {
                Role::Plain => {
                    instr(out, "SET", addr(node));
                    instr(out, "ADD", R4);
                    instr(out, "LOADI", 0);
                    instr(out, "STORE", R4);
                }
                Role::TArg => {
                    instr(out, "LOAD", addr(node));
                    instr(out, "ADD", R4);
                    instr(out, "LOADI", 0);
                    instr(out, "STORE", R4);
                }
                other => unreachable!("array has unexpected role {other:?}"),
            }
        }
        other => unreachable!("VALUE's child must be NUMBER/IDENTIFIER/TABLE, got {other:?}"),
    }
    let _ = session;
}

// EXPRESSION: anchor-less pass-through, or `+ - * / %` over two VALUE children.
fn build_expression(node: &Node, session: &Session, out: &mut String) {
    let Some(op_tok) = &node.anchor else {
        build_value(&node.children[0], session, out);
        return;
    };
    let op = op_tok.borrow().lexeme.clone();
    let a = &node.children[0];
    let b = &node.children[1];
    match op.as_str() {
        "+" | "-" => {
            build_value(b, session, out);
            instr(out, "LOAD", R4);
            instr(out, "STORE", R1);
            build_value(a, session, out);
            instr(out, "LOAD", R4);
            instr(out, if op == "+" { "ADD" } else { "SUB" }, R1);
            instr(out, "STORE", R4);
        }
        "*" => build_mul(node.id, a, b, session, out),
        "/" => build_div(node.id, a, b, session, out),
        "%" => build_mod(node.id, a, b, session, out),
        other => unreachable!("unknown expression operator {other:?}"),
    }
}

// CONDITION: anchor is the comparator. Uniform SUB + 3-instruction 0/1 decode.
fn build_condition(node: &Node, session: &Session, out: &mut String) {
    let op = node.anchor().borrow().lexeme.clone();
    build_value(&node.children[1], session, out);
    instr(out, "STORE", R1);
    build_value(&node.children[0], session, out);
    instr(out, "SUB", R1);

    let (branch_op, taken_reg, not_taken_reg) = match op.as_str() {
        "<" => ("JNEG", R6, R5),
        "<=" => ("JPOS", R5, R6),
        "=" => ("JZERO", R6, R5),
        "!=" => ("JZERO", R5, R6),
        ">" => ("JPOS", R6, R5),
        ">=" => ("JNEG", R5, R6),
        other => unreachable!("unknown comparison operator {other:?}"),
    };
    instr(out, branch_op, 3);
    instr(out, "LOAD", not_taken_reg);
    instr(out, "JUMP", 2);
    instr(out, "LOAD", taken_reg);
    instr(out, "STORE", R4);
}

// IF_COMMAND.
fn build_if(node: &Node, session: &Session, out: &mut String) {
    let id = node.id;
    build_condition(&node.children[0], session, out);
    instr(out, "LOAD", R4);
    jump_label(out, "JZERO", &lbl("END_IF", id));
    build_commands(&node.children[1], session, out);
    label_def(out, &lbl("END_IF", id));
}

// IF_ELSE_COMMAND.
fn build_if_else(node: &Node, session: &Session, out: &mut String) {
    let id = node.id;
    build_condition(&node.children[0], session, out);
    instr(out, "LOAD", R4);
    jump_label(out, "JPOS", &lbl("THEN_IF", id));
    build_commands(&node.children[2], session, out);
    jump_label(out, "JUMP", &lbl("END_IF", id));
    label_def(out, &lbl("THEN_IF", id));
    build_commands(&node.children[1], session, out);
    label_def(out, &lbl("END_IF", id));
}

// WHILE_COMMAND.
fn build_while(node: &Node, session: &Session, out: &mut String) {
    let id = node.id;
    label_def(out, &lbl("COND_WHILE", id));
    build_condition(&node.children[0], session, out);
    instr(out, "LOAD", R4);
    jump_label(out, "JZERO", &lbl("END_WHILE", id));
    build_commands(&node.children[1], session, out);
    jump_label(out, "JUMP", &lbl("COND_WHILE", id));
    label_def(out, &lbl("END_WHILE", id));
}

// REPEAT_COMMAND.
fn build_repeat(node: &Node, session: &Session, out: &mut String) {
    let id = node.id;
    label_def(out, &lbl("REPEAT_START", id));
    build_commands(&node.children[0], session, out);
    build_condition(&node.children[1], session, out);
    instr(out, "LOAD", R4);
    jump_label(out, "JZERO", &lbl("REPEAT_START", id));
}

// FORTO_COMMAND. Anchor: the hidden iterator token.
fn build_for_to(node: &Node, session: &Session, out: &mut String) {
    let id = node.id;
    let iter = addr(node);
    build_value(&node.children[0], session, out);
    instr(out, "LOAD", R4);
    instr(out, "STORE", iter);
    label_def(out, &lbl("FOR_BODY", id));
    build_value(&node.children[1], session, out);
    instr(out, "LOAD", iter);
    instr(out, "SUB", R4);
    jump_label(out, "JPOS", &lbl("FOR_END", id));
    build_commands(&node.children[2], session, out);
    instr(out, "LOAD", iter);
    instr(out, "ADD", R6);
    instr(out, "STORE", iter);
    jump_label(out, "JUMP", &lbl("FOR_BODY", id));
    label_def(out, &lbl("FOR_END", id));
}

// FORDOWNTO_COMMAND: symmetric, SUB R6 and JNEG *FOR_END after comparing
// against the lower bound.
fn build_for_downto(node: &Node, session: &Session, out: &mut String) {
    let id = node.id;
    let iter = addr(node);
    build_value(&node.children[0], session, out);
    instr(out, "LOAD", R4);
    instr(out, "STORE", iter);
    label_def(out, &lbl("FOR_BODY", id));
    build_value(&node.children[1], session, out);
    instr(out, "LOAD", iter);
    instr(out, "SUB", R4);
    jump_label(out, "JNEG", &lbl("FOR_END", id));
    build_commands(&node.children[2], session, out);
    instr(out, "LOAD", iter);
    instr(out, "SUB", R6);
    instr(out, "STORE", iter);
    jump_label(out, "JUMP", &lbl("FOR_BODY", id));
    label_def(out, &lbl("FOR_END", id));
}

// READ_COMMAND. ARG scalars and array elements use indirect-store semantics
// (spec §9's resolution of the "READ on an ARG parameter" Open Question):
// read into R4, then STOREI through the cell holding the target address.
fn build_read(node: &Node, _session: &Session, out: &mut String) {
    let target = &node.children[0];
    match target.kind {
        NodeKind::Identifier => match role(target) {
            Role::Plain => instr(out, "GET", addr(target)),
            Role::Arg => {
                instr(out, "GET", R4);
                instr(out, "LOAD", R4);
                instr(out, "STOREI", addr(target));
            }
            other => unreachable!("read target has unexpected role {other:?}"),
        },
        NodeKind::Table => {
            build_index(&target.children[0], out);
            match role(target) {
                Role::Plain => {
                    instr(out, "SET", addr(target));
                    instr(out, "ADD", R4);
                    instr(out, "STORE", R3);
                }
                Role::TArg => {
                    instr(out, "LOAD", addr(target));
                    instr(out, "ADD", R4);
                    instr(out, "STORE", R3);
                }
                other => unreachable!("array read target has unexpected role {other:?}"),
            }
            instr(out, "GET", R4);
            instr(out, "LOAD", R4);
            instr(out, "STOREI", R3);
        }
        other => unreachable!("read target must be IDENTIFIER or TABLE, got {other:?}"),
    }
}

// WRITE_COMMAND.
fn build_write(node: &Node, session: &Session, out: &mut String) {
    build_value(&node.children[0], session, out);
    instr(out, "PUT", R4);
}

// PROC_CALL (called directly; PROC_CALL_COMMAND just unwraps to this).
fn build_proc_call(node: &Node, session: &Session, out: &mut String) {
    let callee_tok = node.anchor();
    let formals = callee_tok.borrow().formals.clone();
    let callee_addr = callee_tok
        .borrow()
        .address
        .expect("callee must have a return-address cell");
    let callee_name = callee_tok.borrow().lexeme.clone();

    let args_node = &node.children[0];
    for (formal, actual) in formals.iter().zip(args_node.extra_tokens.iter()) {
        let formal_addr = formal
            .borrow()
            .address
            .expect("formal parameter must have an allocated cell");
        let actual_addr = actual
            .borrow()
            .address
            .expect("call actual must be resolved before emission");
        let actual_is_ref = matches!(actual.borrow().role, Role::Arg | Role::TArg);
        if actual_is_ref {
            instr(out, "LOAD", actual_addr);
        } else {
            instr(out, "SET", actual_addr);
        }
        instr(out, "STORE", formal_addr);
    }
    let _ = session;
    set_rel(out, 3);
    instr(out, "STORE", callee_addr);
    jump_label(out, "JUMP", &format!("PROC_{callee_name}"));
}

// `*`: sign-extract both operands, swap so the smaller is the multiplier,
// shift-and-add (binary long multiplication), re-sign.
fn build_mul(id: i64, a: &Node, b: &Node, session: &Session, out: &mut String) {
    instr(out, "LOAD", R5);
    instr(out, "STORE", R3); // sign = 0 (positive)

    build_value(b, session, out);
    instr(out, "LOAD", R4);
    instr(out, "STORE", R2); // R2 = b
    instr(out, "LOAD", R2);
    jump_label(out, "JNEG", &lbl("MUL_NEG_B", id));
    jump_label(out, "JUMP", &lbl("MUL_A", id));
    label_def(out, &lbl("MUL_NEG_B", id));
    instr(out, "LOAD", R2);
    instr(out, "SUB", R2);
    instr(out, "SUB", R2);
    instr(out, "STORE", R2); // R2 = |b|
    instr(out, "LOAD", R6);
    instr(out, "STORE", R3); // sign = 1
    label_def(out, &lbl("MUL_A", id));

    build_value(a, session, out);
    instr(out, "LOAD", R4);
    instr(out, "STORE", R1); // R1 = a
    instr(out, "LOAD", R1);
    jump_label(out, "JNEG", &lbl("MUL_NEG_A", id));
    jump_label(out, "JUMP", &lbl("MUL_SWAP", id));
    label_def(out, &lbl("MUL_NEG_A", id));
    instr(out, "LOAD", R1);
    instr(out, "SUB", R1);
    instr(out, "SUB", R1);
    instr(out, "STORE", R1); // R1 = |a|
    instr(out, "LOAD", R3);
    jump_label(out, "JPOS", &lbl("MUL_FLIP_TO_POS", id));
    instr(out, "LOAD", R6);
    instr(out, "STORE", R3); // sign 0 -> 1 (only a is negative)
    jump_label(out, "JUMP", &lbl("MUL_SWAP", id));
    label_def(out, &lbl("MUL_FLIP_TO_POS", id));
    op0(out, "HALF"); // sign 1 -> 0 (both negative cancel out)
    instr(out, "STORE", R3);
    label_def(out, &lbl("MUL_SWAP", id));

    instr(out, "LOAD", R1);
    instr(out, "SUB", R2);
    jump_label(out, "JPOS", &lbl("MUL_INIT", id)); // a > b: already in the right order
    instr(out, "LOAD", R1);
    instr(out, "STORE", R4);
    instr(out, "LOAD", R2);
    instr(out, "STORE", R1);
    instr(out, "LOAD", R4);
    instr(out, "STORE", R2); // swap so R2 (the multiplier) is the smaller one
    label_def(out, &lbl("MUL_INIT", id));

    instr(out, "LOAD", R5);
    instr(out, "STORE", R4); // result = 0
    label_def(out, &lbl("MUL_LOOP", id));
    instr(out, "LOAD", R2);
    jump_label(out, "JZERO", &lbl("MUL_LOOP_END", id));
    instr(out, "LOAD", R2);
    op0(out, "HALF");
    instr(out, "STORE", R7); // R7 = floor(multiplier / 2)
    instr(out, "LOAD", R7);
    instr(out, "ADD", R7);
    instr(out, "SUB", R2); // 2*floor(multiplier/2) - multiplier: 0 iff even
    jump_label(out, "JZERO", &lbl("MUL_EVEN", id));
    instr(out, "LOAD", R4);
    instr(out, "ADD", R1);
    instr(out, "STORE", R4); // odd bit: accumulate the multiplicand
    label_def(out, &lbl("MUL_EVEN", id));
    instr(out, "LOAD", R1);
    instr(out, "ADD", R1);
    instr(out, "STORE", R1); // multiplicand *= 2
    instr(out, "LOAD", R7);
    instr(out, "STORE", R2); // multiplier = floor(multiplier / 2)
    jump_label(out, "JUMP", &lbl("MUL_LOOP", id));
    label_def(out, &lbl("MUL_LOOP_END", id));

    instr(out, "LOAD", R3);
    jump_label(out, "JZERO", &lbl("MUL_EXIT", id));
    instr(out, "LOAD", R4);
    instr(out, "SUB", R4);
    instr(out, "SUB", R4);
    instr(out, "STORE", R4); // negate
    label_def(out, &lbl("MUL_EXIT", id));
}

// `/`: restoring binary division on absolute values (grounded in the
// original's DIV_START_LOOP/DIV_LOOP structure), floor-division re-signing.
fn build_div(id: i64, a: &Node, b: &Node, session: &Session, out: &mut String) {
    build_value(b, session, out);
    instr(out, "LOAD", R4);
    jump_label(out, "JZERO", &lbl("DIV_BY_ZERO", id));
    instr(out, "STORE", R2); // R2 = b

    instr(out, "LOAD", R5);
    instr(out, "STORE", R7); // sign count = 0
    instr(out, "LOAD", R2);
    jump_label(out, "JNEG", &lbl("DIV_NEG_B", id));
    jump_label(out, "JUMP", &lbl("DIV_A", id));
    label_def(out, &lbl("DIV_NEG_B", id));
    instr(out, "LOAD", R2);
    instr(out, "SUB", R2);
    instr(out, "SUB", R2);
    instr(out, "STORE", R2); // R2 = |b|
    instr(out, "LOAD", R7);
    instr(out, "ADD", R6);
    instr(out, "STORE", R7); // sign count += 1
    label_def(out, &lbl("DIV_A", id));

    build_value(a, session, out);
    instr(out, "LOAD", R4);
    jump_label(out, "JZERO", &lbl("DIV_BY_ZERO", id)); // a == 0 => quotient 0 regardless
    instr(out, "STORE", R1); // R1 = a
    instr(out, "LOAD", R1);
    jump_label(out, "JNEG", &lbl("DIV_NEG_A", id));
    jump_label(out, "JUMP", &lbl("DIV_INIT", id));
    label_def(out, &lbl("DIV_NEG_A", id));
    instr(out, "LOAD", R1);
    instr(out, "SUB", R1);
    instr(out, "SUB", R1);
    instr(out, "STORE", R1); // R1 = |a|
    instr(out, "LOAD", R7);
    instr(out, "ADD", R6);
    instr(out, "STORE", R7); // sign count += 1
    label_def(out, &lbl("DIV_INIT", id));

    instr(out, "LOAD", R6);
    instr(out, "STORE", R8); // temp power-of-two = 1
    op0(out, "HALF");
    instr(out, "STORE", R4); // quotient = 0

    label_def(out, &lbl("DIV_OUTER", id));
    instr(out, "LOAD", R2);
    instr(out, "STORE", R3); // temp_divisor = |b|
    label_def(out, &lbl("DIV_GROW", id));
    instr(out, "LOAD", R1);
    instr(out, "SUB", R3);
    jump_label(out, "JNEG", &lbl("DIV_GROW_END", id));
    instr(out, "LOAD", R8);
    instr(out, "ADD", R8);
    instr(out, "STORE", R8); // power *= 2
    instr(out, "LOAD", R3);
    instr(out, "ADD", R3);
    instr(out, "STORE", R3); // temp_divisor *= 2
    jump_label(out, "JUMP", &lbl("DIV_GROW", id));
    label_def(out, &lbl("DIV_GROW_END", id));
    instr(out, "LOAD", R8);
    op0(out, "HALF");
    instr(out, "STORE", R8); // back off the overshoot
    instr(out, "ADD", R4);
    instr(out, "STORE", R4); // quotient += power
    instr(out, "LOAD", R3);
    op0(out, "HALF");
    instr(out, "STORE", R3); // back off the overshoot
    instr(out, "LOAD", R1);
    instr(out, "SUB", R3);
    instr(out, "STORE", R1); // remainder -= temp_divisor
    instr(out, "SUB", R2);
    jump_label(out, "JNEG", &lbl("DIV_SIGN", id)); // remainder < divisor: done
    instr(out, "LOAD", R6);
    instr(out, "STORE", R8); // reset power for the next outer pass
    jump_label(out, "JUMP", &lbl("DIV_OUTER", id));

    label_def(out, &lbl("DIV_SIGN", id));
    instr(out, "LOAD", R7);
    jump_label(out, "JZERO", &lbl("DIV_SAME", id)); // both positive
    instr(out, "SUB", R6);
    jump_label(out, "JZERO", &lbl("DIV_DIFF", id)); // exactly one negative
    jump_label(out, "JUMP", &lbl("DIV_SAME", id)); // both negative

    label_def(out, &lbl("DIV_DIFF", id));
    instr(out, "LOAD", R4);
    instr(out, "ADD", R6);
    instr(out, "STORE", R8);
    instr(out, "SUB", R8);
    instr(out, "SUB", R8);
    instr(out, "STORE", R4); // -(quotient + 1)
    jump_label(out, "JUMP", &lbl("DIV_EXIT", id));

    label_def(out, &lbl("DIV_SAME", id));
    jump_label(out, "JUMP", &lbl("DIV_EXIT", id)); // quotient already correct

    label_def(out, &lbl("DIV_BY_ZERO", id));
    instr(out, "LOAD", R5);
    instr(out, "STORE", R4);

    label_def(out, &lbl("DIV_EXIT", id));
}

// `%`: the same restoring loop as `/`, tracking only the remainder (not the
// quotient), then floor-mod re-signing per spec §4.3 (checking for a zero
// remainder in the differing-sign case, rather than the original's
// unconditional formula).
fn build_mod(id: i64, a: &Node, b: &Node, session: &Session, out: &mut String) {
    build_value(b, session, out);
    instr(out, "LOAD", R4);
    jump_label(out, "JZERO", &lbl("MOD_BY_ZERO", id));
    instr(out, "STORE", R2); // R2 = b

    instr(out, "LOAD", R5);
    instr(out, "STORE", R7); // b_negative = 0
    instr(out, "LOAD", R2);
    jump_label(out, "JNEG", &lbl("MOD_NEG_B", id));
    jump_label(out, "JUMP", &lbl("MOD_A", id));
    label_def(out, &lbl("MOD_NEG_B", id));
    instr(out, "LOAD", R2);
    instr(out, "SUB", R2);
    instr(out, "SUB", R2);
    instr(out, "STORE", R2); // R2 = |b|
    instr(out, "LOAD", R6);
    instr(out, "STORE", R7); // b_negative = 1
    label_def(out, &lbl("MOD_A", id));

    build_value(a, session, out);
    instr(out, "LOAD", R4);
    jump_label(out, "JZERO", &lbl("MOD_BY_ZERO", id));
    instr(out, "STORE", R1); // R1 = a
    instr(out, "LOAD", R5);
    instr(out, "STORE", R8); // a_negative = 0
    instr(out, "LOAD", R1);
    jump_label(out, "JNEG", &lbl("MOD_NEG_A", id));
    jump_label(out, "JUMP", &lbl("MOD_LOOP", id));
    label_def(out, &lbl("MOD_NEG_A", id));
    instr(out, "LOAD", R1);
    instr(out, "SUB", R1);
    instr(out, "SUB", R1);
    instr(out, "STORE", R1); // R1 = |a|
    instr(out, "LOAD", R6);
    instr(out, "STORE", R8); // a_negative = 1
    label_def(out, &lbl("MOD_LOOP", id));

    // Remainder-only restoring loop: while R1 >= R2, subtract the largest
    // doubling of R2 that still fits.
    label_def(out, &lbl("MOD_OUTER", id));
    instr(out, "LOAD", R1);
    instr(out, "SUB", R2);
    jump_label(out, "JNEG", &lbl("MOD_DONE_LOOP", id));
    instr(out, "LOAD", R2);
    instr(out, "STORE", R3);
    label_def(out, &lbl("MOD_GROW", id));
    instr(out, "LOAD", R1);
    instr(out, "SUB", R3);
    jump_label(out, "JNEG", &lbl("MOD_GROW_END", id));
    instr(out, "LOAD", R3);
    instr(out, "ADD", R3);
    instr(out, "STORE", R3);
    jump_label(out, "JUMP", &lbl("MOD_GROW", id));
    label_def(out, &lbl("MOD_GROW_END", id));
    instr(out, "LOAD", R3);
    op0(out, "HALF");
    instr(out, "STORE", R3);
    instr(out, "LOAD", R1);
    instr(out, "SUB", R3);
    instr(out, "STORE", R1);
    jump_label(out, "JUMP", &lbl("MOD_OUTER", id));
    label_def(out, &lbl("MOD_DONE_LOOP", id));
    // R1 now holds |a| mod |b|.

    instr(out, "LOAD", R7);
    jump_label(out, "JZERO", &lbl("MOD_B_POS", id));
    jump_label(out, "JUMP", &lbl("MOD_B_NEG", id));
    label_def(out, &lbl("MOD_B_POS", id));
    instr(out, "LOAD", R8);
    jump_label(out, "JZERO", &lbl("MOD_SAME", id)); // both positive
    jump_label(out, "JUMP", &lbl("MOD_DIFF", id)); // a negative, b positive
    label_def(out, &lbl("MOD_B_NEG", id));
    instr(out, "LOAD", R8);
    jump_label(out, "JZERO", &lbl("MOD_DIFF", id)); // a positive, b negative
    jump_label(out, "JUMP", &lbl("MOD_SAME", id)); // both negative

    label_def(out, &lbl("MOD_SAME", id));
    instr(out, "LOAD", R8);
    jump_label(out, "JZERO", &lbl("MOD_SAME_POS", id));
    instr(out, "LOAD", R5);
    instr(out, "SUB", R1);
    instr(out, "STORE", R4); // sign(a) negative: result = -remainder
    jump_label(out, "JUMP", &lbl("MOD_EXIT", id));
    label_def(out, &lbl("MOD_SAME_POS", id));
    instr(out, "LOAD", R1);
    instr(out, "STORE", R4); // sign(a) positive: result = remainder
    jump_label(out, "JUMP", &lbl("MOD_EXIT", id));

    label_def(out, &lbl("MOD_DIFF", id));
    instr(out, "LOAD", R1);
    jump_label(out, "JZERO", &lbl("MOD_DIFF_ZERO", id));
    instr(out, "LOAD", R2);
    instr(out, "SUB", R1); // |b| - remainder
    jump_label(out, "JUMP", &lbl("MOD_DIFF_SIGN", id));
    label_def(out, &lbl("MOD_DIFF_ZERO", id));
    instr(out, "LOAD", R5); // remainder was exactly 0: result stays 0
    label_def(out, &lbl("MOD_DIFF_SIGN", id));
    instr(out, "STORE", R3);
    instr(out, "LOAD", R7);
    jump_label(out, "JZERO", &lbl("MOD_DIFF_DONE", id));
    instr(out, "LOAD", R5);
    instr(out, "SUB", R3);
    instr(out, "STORE", R4); // sign(b) negative: result = -(|b|-remainder)
    jump_label(out, "JUMP", &lbl("MOD_EXIT", id));
    label_def(out, &lbl("MOD_DIFF_DONE", id));
    instr(out, "LOAD", R3);
    instr(out, "STORE", R4); // sign(b) positive: result = |b|-remainder
    jump_label(out, "JUMP", &lbl("MOD_EXIT", id));

    label_def(out, &lbl("MOD_BY_ZERO", id));
    instr(out, "LOAD", R5);
    instr(out, "STORE", R4);

    label_def(out, &lbl("MOD_EXIT", id));
}
