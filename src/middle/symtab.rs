//! Lexically scoped symbol table and address allocator (spec §4.1).
//!
//! One scope per procedure plus a single `"main"` scope; lookups search only
//! the innermost scope (this language has no nesting beyond proc/main).
//! Procedure names live in their own namespace (`declare_proc` is global by
//! construction) since a call must resolve regardless of which scope it is
//! issued from.

use std::collections::HashMap;

use crate::common::{Diagnostic, Session};
use crate::front::lex::{Role, TokenRef};

/// Everything the table remembers about a declared name, independent of any
/// particular AST occurrence's `Token`. `is_array` is not part of the
/// `Token::role` closed set (spec §3) — it only matters for validating
/// procedure-call argument kinds (§4.2), so it lives here instead.
#[derive(Clone, Debug)]
pub struct Symbol {
    pub address: i64,
    pub mutable: bool,
    pub role: Role,
    pub is_array: bool,
    pub formals: Vec<TokenRef>,
}

#[derive(Default)]
struct Scope {
    names: HashMap<String, Symbol>,
}

pub struct SymbolTable {
    scopes: HashMap<String, Scope>,
    procs: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            scopes: HashMap::new(),
            procs: HashMap::new(),
        }
    }

    fn scope_mut(&mut self, scope: &str) -> &mut Scope {
        self.scopes.entry(scope.to_string()).or_default()
    }

    pub fn declare_scalar(
        &mut self,
        scope: &str,
        tok: &TokenRef,
        session: &mut Session,
    ) -> Result<(), Diagnostic> {
        let (name, line) = {
            let t = tok.borrow();
            (t.lexeme.clone(), t.line)
        };
        if self.scope_mut(scope).names.contains_key(&name) {
            return Err(Diagnostic::Redeclared { lexeme: name, line });
        }
        let address = session.alloc(1);
        let symbol = Symbol {
            address,
            mutable: true,
            role: Role::Plain,
            is_array: false,
            formals: Vec::new(),
        };
        apply(tok, &symbol);
        self.scope_mut(scope).names.insert(name, symbol);
        Ok(())
    }

    /// `lo`/`hi` are the declared bounds; `tok.address` is set to
    /// `first_cell - lo` so that element `i` lives at `address + i`.
    pub fn declare_array(
        &mut self,
        scope: &str,
        tok: &TokenRef,
        lo: i64,
        hi: i64,
        session: &mut Session,
    ) -> Result<(), Diagnostic> {
        let (name, line) = {
            let t = tok.borrow();
            (t.lexeme.clone(), t.line)
        };
        if self.scope_mut(scope).names.contains_key(&name) {
            return Err(Diagnostic::Redeclared { lexeme: name, line });
        }
        if hi < lo {
            return Err(Diagnostic::BadRange { lexeme: name, line });
        }
        let width = hi - lo + 1;
        let first_cell = session.alloc(width);
        let address = first_cell - lo;
        let symbol = Symbol {
            address,
            mutable: true,
            role: Role::Plain,
            is_array: true,
            formals: Vec::new(),
        };
        apply(tok, &symbol);
        self.scope_mut(scope).names.insert(name, symbol);
        Ok(())
    }

    /// Allocates one cell regardless of scalar/array formal kind — the cell
    /// holds an address, not a value. `tok.role` must already be `Arg` or
    /// `TArg` (set by the parser when it reads the optional `T` marker).
    pub fn declare_formal(
        &mut self,
        scope: &str,
        tok: &TokenRef,
        session: &mut Session,
    ) -> Result<(), Diagnostic> {
        let (name, line, role) = {
            let t = tok.borrow();
            (t.lexeme.clone(), t.line, t.role)
        };
        if self.scope_mut(scope).names.contains_key(&name) {
            return Err(Diagnostic::Redeclared { lexeme: name, line });
        }
        let address = session.alloc(1);
        let symbol = Symbol {
            address,
            mutable: true,
            role,
            is_array: role == Role::TArg,
            formals: Vec::new(),
        };
        apply(tok, &symbol);
        self.scope_mut(scope).names.insert(name, symbol);
        Ok(())
    }

    /// Global scope only: allocates one cell for the return address. Fails
    /// `REDECLARED` on conflict with an earlier procedure of the same name.
    /// `tok.formals` must already be populated by the caller before this
    /// runs (the header-collection pass sets it from the `ArgsDecl` node).
    pub fn declare_proc(&mut self, tok: &TokenRef, session: &mut Session) -> Result<(), Diagnostic> {
        let (name, line, formals) = {
            let t = tok.borrow();
            (t.lexeme.clone(), t.line, t.formals.clone())
        };
        if self.procs.contains_key(&name) {
            return Err(Diagnostic::Redeclared { lexeme: name, line });
        }
        let address = session.alloc(1);
        let symbol = Symbol {
            address,
            mutable: false,
            role: Role::Proc,
            is_array: false,
            formals,
        };
        apply(tok, &symbol);
        self.procs.insert(name, symbol);
        Ok(())
    }

    /// Resolve `tok` (an identifier occurrence, not its declaration) against
    /// `scope`, and copy the declared address/mutable/role onto it. Leaves
    /// `tok`'s `lexeme`/`line`/`column` untouched (those describe the use
    /// site, not the declaration).
    pub fn lookup(&self, scope: &str, tok: &TokenRef) -> Result<(), Diagnostic> {
        let symbol = self.lookup_symbol(scope, &tok.borrow().lexeme);
        match symbol {
            Some(symbol) => {
                apply(tok, &symbol);
                Ok(())
            }
            None => {
                let t = tok.borrow();
                Err(Diagnostic::Undeclared {
                    lexeme: t.lexeme.clone(),
                    line: t.line,
                })
            }
        }
    }

    /// Look up a declared name's full classification without mutating any
    /// token — used by procedure-call argument validation, which needs to
    /// know `is_array` for both the formal and the actual.
    pub fn lookup_symbol(&self, scope: &str, name: &str) -> Option<Symbol> {
        self.scopes.get(scope).and_then(|s| s.names.get(name)).cloned()
    }

    pub fn lookup_proc(&self, name: &str) -> Option<Symbol> {
        self.procs.get(name).cloned()
    }

    /// Temporarily (or permanently) flip a scope-local symbol's mutability,
    /// e.g. to make a `for` loop's iterator immutable for the duration of
    /// its body. No-op if `name` isn't declared in `scope`.
    pub fn set_mutable(&mut self, scope: &str, name: &str, mutable: bool) {
        if let Some(symbol) = self.scope_mut(scope).names.get_mut(name) {
            symbol.mutable = mutable;
        }
    }

    pub fn contains(&self, scope: &str, name: &str) -> bool {
        self.scopes
            .get(scope)
            .map(|s| s.names.contains_key(name))
            .unwrap_or(false)
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

fn apply(tok: &TokenRef, symbol: &Symbol) {
    let mut t = tok.borrow_mut();
    t.address = Some(symbol.address);
    t.mutable = symbol.mutable;
    t.role = symbol.role;
    if symbol.role == Role::Proc {
        t.formals = symbol.formals.clone();
    }
}
