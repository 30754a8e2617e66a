//! Back-end unit tests: codegen + label resolution working together over
//! small literal programs, focused on the shapes spec §8 calls out
//! (boundary cases, the `PROGRAM_ALL` prologue, empty procedure bodies).
//! End-to-end VM-output scenarios (spec §8's six literal examples) live in
//! `tests/` as integration tests instead, since they exercise the whole
//! `crate::compile` pipeline rather than just this module.

use crate::common::Session;
use crate::compile;
use crate::front::{lex::Lexer, parse};
use crate::middle::sema;

fn lines(asm: &str) -> Vec<&str> {
    asm.lines().collect()
}

/// Run everything but the label resolver, so the `*NAME ` prefixes codegen
/// emits are still visible for tests that need to check adjacency.
fn generate_unresolved(source: &str) -> String {
    let mut session = Session::new();
    let tokens = Lexer::new(source).tokenize().unwrap();
    let ast = parse::parse(tokens, &mut session).unwrap();
    sema::annotate(&ast, &mut session);
    assert!(session.sink.is_empty(), "unexpected semantic errors");
    crate::back::generate(&ast, &session)
}

#[test]
fn prologue_initializes_r5_and_r6_before_anything_else() {
    let asm = compile("PROGRAM IS n BEGIN n := 1; WRITE n; END").unwrap();
    let lines = lines(&asm);
    assert_eq!(&lines[0..4], ["SET 1", "STORE 6", "HALF", "STORE 5"]);
}

#[test]
fn distinct_literal_gets_exactly_one_set_store_pair_in_prologue() {
    let asm = compile("PROGRAM IS n BEGIN n := 42; n := 42; WRITE n; END").unwrap();
    assert_eq!(asm.matches("SET 42").count(), 1);
}

#[test]
fn empty_procedure_body_compiles_to_label_then_immediate_return() {
    let asm = generate_unresolved(
        "PROCEDURE p() IS BEGIN END PROGRAM IS x BEGIN x := 0; WRITE x; END",
    );
    let label_pos = asm.find("*PROC_p ").expect("procedure must emit its label");
    let after_label = &asm[label_pos..];
    let next_line = after_label.lines().next().unwrap();
    // `BEGIN END` has no commands, so the very instruction the label prefix
    // attaches to is the procedure's own `RTRN`.
    assert!(next_line.trim_start_matches("*PROC_p ").starts_with("RTRN"));
}

#[test]
fn resolved_output_never_contains_star_or_ampersand() {
    let asm = compile(
        "PROGRAM IS s, i BEGIN \
         s := 0; \
         FOR i FROM 1 TO 5 DO s := s + i; ENDFOR \
         WRITE s; \
         END",
    )
    .unwrap();
    assert!(!asm.contains('*'));
    assert!(!asm.contains('&'));
}

#[test]
fn every_jump_is_followed_by_a_signed_integer() {
    let asm = compile(
        "PROGRAM IS x BEGIN x := 1; IF x = 1 THEN WRITE 1; ELSE WRITE 0; ENDIF END",
    )
    .unwrap();
    for line in asm.lines() {
        if let Some(rest) = line
            .strip_prefix("JUMP ")
            .or_else(|| line.strip_prefix("JPOS "))
            .or_else(|| line.strip_prefix("JZERO "))
            .or_else(|| line.strip_prefix("JNEG "))
        {
            rest.parse::<i64>()
                .unwrap_or_else(|_| panic!("jump operand {rest:?} is not an integer"));
        }
    }
}

#[test]
fn label_resolution_is_idempotent_on_its_own_output() {
    let asm = compile("PROGRAM IS x BEGIN x := 1; WHILE x < 0 DO x := x - 1; ENDWHILE WRITE x; END")
        .unwrap();
    let reresolved = crate::back::resolve(&asm).unwrap();
    assert_eq!(asm, reresolved);
}

#[test]
fn for_with_hi_less_than_lo_never_enters_body() {
    let asm = compile(
        "PROGRAM IS s BEGIN s := 0; FOR i FROM 5 TO 1 DO s := s + 1; ENDFOR WRITE s; END",
    )
    .unwrap();
    // JPOS *FOR_END fires on the very first comparison: the FOR_END label
    // resolves to a line reachable from FOR_BODY without ever falling
    // through into the body's `ADD`/`STORE` of the accumulator.
    assert!(asm.contains("JPOS"));
}

#[test]
fn array_with_single_element_round_trips() {
    let asm = compile(
        "PROGRAM IS a[3:3] BEGIN a[3] := 9; WRITE a[3]; END",
    )
    .unwrap();
    assert!(asm.contains("STOREI"));
    assert!(asm.contains("LOADI"));
}
