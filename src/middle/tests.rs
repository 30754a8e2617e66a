//! Symbol table allocation arithmetic and semantic-annotation unit tests.

use crate::common::{Diagnostic, Session, BASE};
use crate::front::lex::{Role, Token, TokenKind};
use crate::front::parse;
use crate::middle::sema;
use crate::middle::symtab::SymbolTable;

fn ident(name: &str) -> crate::front::lex::TokenRef {
    Token::new(TokenKind::Identifier, name, 1, 1).shared()
}

#[test]
fn declare_scalar_allocates_sequential_addresses() {
    let mut session = Session::new();
    let mut symtab = SymbolTable::new();
    symtab.declare_scalar("main", &ident("x"), &mut session).unwrap();
    symtab.declare_scalar("main", &ident("y"), &mut session).unwrap();
    let x = symtab.lookup_symbol("main", "x").unwrap();
    let y = symtab.lookup_symbol("main", "y").unwrap();
    assert_eq!(y.address, x.address + 1);
}

#[test]
fn redeclaring_in_the_same_scope_is_an_error() {
    let mut session = Session::new();
    let mut symtab = SymbolTable::new();
    symtab.declare_scalar("main", &ident("x"), &mut session).unwrap();
    let err = symtab.declare_scalar("main", &ident("x"), &mut session).unwrap_err();
    assert!(matches!(err, Diagnostic::Redeclared { .. }));
}

#[test]
fn same_name_in_different_scopes_does_not_collide() {
    let mut session = Session::new();
    let mut symtab = SymbolTable::new();
    symtab.declare_scalar("main", &ident("x"), &mut session).unwrap();
    symtab.declare_scalar("p", &ident("x"), &mut session).unwrap();
    assert!(symtab.lookup_symbol("main", "x").is_some());
    assert!(symtab.lookup_symbol("p", "x").is_some());
}

#[test]
fn declare_array_address_is_first_cell_minus_lo() {
    let mut session = Session::new();
    let mut symtab = SymbolTable::new();
    symtab.declare_array("main", &ident("a"), 3, 5, &mut session).unwrap();
    let a = symtab.lookup_symbol("main", "a").unwrap();
    // width = 5 - 3 + 1 = 3 cells starting at BASE, so element 3 lives at
    // BASE itself and `a.address` (element 3's virtual zero point) is
    // `BASE - 3`.
    assert_eq!(a.address, BASE - 3);
    assert!(a.is_array);
}

#[test]
fn declare_array_rejects_hi_less_than_lo() {
    let mut session = Session::new();
    let mut symtab = SymbolTable::new();
    let err = symtab.declare_array("main", &ident("a"), 5, 1, &mut session).unwrap_err();
    assert!(matches!(err, Diagnostic::BadRange { .. }));
}

#[test]
fn declare_formal_allocates_one_cell_regardless_of_array_kind() {
    let mut session = Session::new();
    let mut symtab = SymbolTable::new();
    let mut scalar_tok = Token::new(TokenKind::Identifier, "a", 1, 1);
    scalar_tok.role = Role::Arg;
    let mut array_tok = Token::new(TokenKind::Identifier, "arr", 1, 1);
    array_tok.role = Role::TArg;

    symtab.declare_formal("p", &scalar_tok.shared(), &mut session).unwrap();
    symtab.declare_formal("p", &array_tok.shared(), &mut session).unwrap();

    let a = symtab.lookup_symbol("p", "a").unwrap();
    let arr = symtab.lookup_symbol("p", "arr").unwrap();
    assert!(!a.is_array);
    assert!(arr.is_array);
    assert_eq!(arr.address, a.address + 1);
}

#[test]
fn lookup_copies_address_and_role_onto_the_use_site_token() {
    let mut session = Session::new();
    let mut symtab = SymbolTable::new();
    symtab.declare_scalar("main", &ident("x"), &mut session).unwrap();
    let declared_address = symtab.lookup_symbol("main", "x").unwrap().address;

    let use_site = ident("x");
    symtab.lookup("main", &use_site).unwrap();
    assert_eq!(use_site.borrow().address, Some(declared_address));
    assert_eq!(use_site.borrow().role, Role::Plain);
}

#[test]
fn lookup_of_an_undeclared_name_is_an_error() {
    let symtab = SymbolTable::new();
    let err = symtab.lookup("main", &ident("ghost")).unwrap_err();
    assert!(matches!(err, Diagnostic::Undeclared { .. }));
}

fn annotate(source: &str) -> (Session, bool) {
    let mut session = Session::new();
    let tokens = crate::front::lex::Lexer::new(source).tokenize().unwrap();
    let ast = parse::parse(tokens, &mut session).unwrap();
    sema::annotate(&ast, &mut session);
    let clean = session.sink.is_empty();
    (session, clean)
}

#[test]
fn using_an_undeclared_variable_reports_one_diagnostic() {
    let (session, clean) = annotate("PROGRAM IS BEGIN x := 1; END");
    assert!(!clean);
    assert_eq!(session.sink.diagnostics().len(), 1);
    assert!(matches!(
        session.sink.diagnostics()[0],
        Diagnostic::Undeclared { .. }
    ));
}

#[test]
fn calling_a_procedure_with_the_wrong_number_of_arguments_is_rejected() {
    let (session, clean) = annotate(
        "PROCEDURE p(a, b) IS BEGIN a := b; END \
         PROGRAM IS x, y BEGIN p(x); END",
    );
    assert!(!clean);
    assert!(session
        .sink
        .diagnostics()
        .iter()
        .any(|d| matches!(d, Diagnostic::ArgCount { .. })));
}

#[test]
fn a_scalar_actual_cannot_satisfy_an_array_formal() {
    let (session, clean) = annotate(
        "PROCEDURE p(T arr) IS BEGIN arr[0] := 0; END \
         PROGRAM IS x BEGIN p(x); END",
    );
    assert!(!clean);
    assert!(session
        .sink
        .diagnostics()
        .iter()
        .any(|d| matches!(d, Diagnostic::ArgKind { .. })));
}

#[test]
fn a_well_formed_program_annotates_with_no_diagnostics() {
    let (_, clean) = annotate("PROGRAM IS x, y BEGIN x := 1; y := x + 1; WRITE y; END");
    assert!(clean);
}

#[test]
fn for_loop_iterator_is_immutable_only_inside_its_own_body() {
    // If the iterator stayed immutable after the loop, this reassignment
    // would report `ImmutableWrite`.
    let (_, clean) = annotate(
        "PROGRAM IS i BEGIN FOR i FROM 1 TO 3 DO WRITE i; ENDFOR i := 99; WRITE i; END",
    );
    assert!(clean);
}
