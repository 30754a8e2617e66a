//! The recursive-descent parser. The grammar itself is standard and
//! uninteresting (see spec §1); what matters to the rest of the compiler is
//! the shape of AST it produces, documented node kind by node kind in
//! `front::ast`.

use crate::common::{Diagnostic, Session};
use crate::front::ast::{Node, NodeKind};
use crate::front::lex::{Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

/// Parse a complete program into a `PROGRAM_ALL` root node. Node ids are
/// assigned from `session`'s monotonically increasing counter as nodes are
/// built, so they are unique across the whole program. This is a one-shot,
/// no-error-recovery parser per spec's Non-goals: the first syntax error
/// aborts parsing.
pub fn parse(tokens: Vec<Token>, session: &mut Session) -> Result<Node, Diagnostic> {
    let mut parser = Parser { tokens, pos: 0 };
    parser.program_all(session)
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn err(&self, message: impl Into<String>) -> Diagnostic {
        let message = message.into();
        if self.at_eof() {
            Diagnostic::Parse {
                message: format!("{message} at end of input"),
            }
        } else {
            let tok = self.peek();
            Diagnostic::Parse {
                message: format!("{message}, found '{}' on line {}", tok.lexeme, tok.line),
            }
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, Diagnostic> {
        if self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.err(format!("expected {kind}")))
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    // program_all -> procedures main
    fn program_all(&mut self, session: &mut Session) -> Result<Node, Diagnostic> {
        let procedures = self.procedures(session)?;
        let main = self.main(session)?;
        let id = session.next_node_id();
        Ok(Node::new(NodeKind::ProgramAll, id).with_children(vec![procedures, main]))
    }

    // procedures -> (PROCEDURE pidentifier '(' args_decl ')' IS [declarations] BEGIN commands END)*
    fn procedures(&mut self, session: &mut Session) -> Result<Node, Diagnostic> {
        let mut acc = {
            let id = session.next_node_id();
            Node::new(NodeKind::Procedures, id)
        };

        while self.check(TokenKind::Procedure) {
            self.advance();
            let name_tok = self.expect(TokenKind::Identifier)?;
            self.expect(TokenKind::LParen)?;
            let args_decl = self.args_decl(session)?;
            self.expect(TokenKind::RParen)?;

            let head_id = session.next_node_id();
            let proc_head = Node::new(NodeKind::ProcHead, head_id)
                .with_anchor(name_tok.shared())
                .with_children(vec![args_decl]);

            self.expect(TokenKind::Is)?;
            let declarations = if self.check(TokenKind::Begin) {
                None
            } else {
                Some(self.declarations(session)?)
            };
            self.expect(TokenKind::Begin)?;
            let commands = self.commands(session)?;
            self.expect(TokenKind::End)?;

            let children = vec![acc, proc_head, commands];
            let id = session.next_node_id();
            acc = Node::new(NodeKind::Procedures, id)
                .with_children(children)
                .with_declarations(declarations);
        }

        Ok(acc)
    }

    // args_decl -> (T? pidentifier (',' T? pidentifier)*)?
    fn args_decl(&mut self, session: &mut Session) -> Result<Node, Diagnostic> {
        use crate::front::lex::Role;

        let mut formals = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                let is_array = self.eat(TokenKind::T);
                let name_tok = self.expect(TokenKind::Identifier)?;
                let mut tok = name_tok;
                tok.role = if is_array { Role::TArg } else { Role::Arg };
                formals.push(tok.shared());
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }

        let id = session.next_node_id();
        Ok(Node::new(NodeKind::ArgsDecl, id).with_extra_tokens(formals))
    }

    // main -> PROGRAM IS [declarations] BEGIN commands END
    fn main(&mut self, session: &mut Session) -> Result<Node, Diagnostic> {
        self.expect(TokenKind::Program)?;
        self.expect(TokenKind::Is)?;
        let declarations = if self.check(TokenKind::Begin) {
            None
        } else {
            Some(self.declarations(session)?)
        };
        self.expect(TokenKind::Begin)?;
        let commands = self.commands(session)?;
        self.expect(TokenKind::End)?;

        let id = session.next_node_id();
        Ok(Node::new(NodeKind::Main, id)
            .with_children(vec![commands])
            .with_declarations(declarations))
    }

    // declarations -> decl (',' decl)*
    // decl -> pidentifier | pidentifier '[' signed_num ':' signed_num ']'
    fn declarations(&mut self, session: &mut Session) -> Result<Node, Diagnostic> {
        let mut decls = Vec::new();
        loop {
            let name_tok = self.expect(TokenKind::Identifier)?;
            if self.eat(TokenKind::LBracket) {
                let lo = self.signed_number()?;
                self.expect(TokenKind::Colon)?;
                let hi = self.signed_number()?;
                self.expect(TokenKind::RBracket)?;
                let id = session.next_node_id();
                decls.push(
                    Node::new(NodeKind::DeclareArray, id)
                        .with_anchor(name_tok.shared())
                        .with_extra_tokens(vec![lo.shared(), hi.shared()]),
                );
            } else {
                let id = session.next_node_id();
                decls.push(Node::new(NodeKind::DeclareScalar, id).with_anchor(name_tok.shared()));
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        let id = session.next_node_id();
        Ok(Node::new(NodeKind::Declarations, id).with_children(decls))
    }

    fn signed_number(&mut self) -> Result<Token, Diagnostic> {
        if self.eat(TokenKind::Minus) {
            let tok = self.expect(TokenKind::Number)?;
            let mut negated = tok.clone();
            negated.lexeme = format!("-{}", tok.lexeme);
            Ok(negated)
        } else {
            self.expect(TokenKind::Number)
        }
    }

    // commands -> command+
    fn commands(&mut self, session: &mut Session) -> Result<Node, Diagnostic> {
        let mut cmds = Vec::new();
        cmds.push(self.command(session)?);
        while self.starts_command() {
            cmds.push(self.command(session)?);
        }
        let id = session.next_node_id();
        Ok(Node::new(NodeKind::Commands, id).with_children(cmds))
    }

    fn starts_command(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Identifier
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Repeat
                | TokenKind::For
                | TokenKind::Read
                | TokenKind::Write
        )
    }

    fn command(&mut self, session: &mut Session) -> Result<Node, Diagnostic> {
        match self.peek_kind() {
            TokenKind::If => self.if_command(session),
            TokenKind::While => self.while_command(session),
            TokenKind::Repeat => self.repeat_command(session),
            TokenKind::For => self.for_command(session),
            TokenKind::Read => self.read_command(session),
            TokenKind::Write => self.write_command(session),
            TokenKind::Identifier => self.identifier_led_command(session),
            _ => Err(self.err("expected a command")),
        }
    }

    // An identifier starts either an assignment or a procedure call.
    fn identifier_led_command(&mut self, session: &mut Session) -> Result<Node, Diagnostic> {
        // Lookahead: `name (` is a call, anything else (incl. `name [`) is an
        // assignment target.
        let save = self.pos;
        let name_tok = self.advance();
        if self.check(TokenKind::LParen) {
            self.advance();
            let args = self.call_args(session)?;
            self.expect(TokenKind::RParen)?;
            self.expect(TokenKind::Semicolon)?;

            let call_id = session.next_node_id();
            let proc_call = Node::new(NodeKind::ProcCall, call_id)
                .with_anchor(name_tok.shared())
                .with_children(vec![args]);

            let id = session.next_node_id();
            return Ok(Node::new(NodeKind::ProcCallCommand, id).with_children(vec![proc_call]));
        }
        self.pos = save;

        let lvalue = self.identifier_ref(session)?;
        self.expect(TokenKind::Assign)?;
        let rhs = self.expression(session)?;
        self.expect(TokenKind::Semicolon)?;

        let id = session.next_node_id();
        Ok(Node::new(NodeKind::AssignmentCommand, id).with_children(vec![lvalue, rhs]))
    }

    // call_args -> (pidentifier (',' pidentifier)*)?
    fn call_args(&mut self, session: &mut Session) -> Result<Node, Diagnostic> {
        let mut actuals = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                let tok = self.expect(TokenKind::Identifier)?;
                actuals.push(tok.shared());
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        let id = session.next_node_id();
        Ok(Node::new(NodeKind::Args, id).with_extra_tokens(actuals))
    }

    fn if_command(&mut self, session: &mut Session) -> Result<Node, Diagnostic> {
        self.expect(TokenKind::If)?;
        let cond = self.condition(session)?;
        self.expect(TokenKind::Then)?;
        let then_branch = self.commands(session)?;
        if self.eat(TokenKind::Else) {
            let else_branch = self.commands(session)?;
            self.expect(TokenKind::Endif)?;
            let id = session.next_node_id();
            Ok(Node::new(NodeKind::IfElseCommand, id)
                .with_children(vec![cond, then_branch, else_branch]))
        } else {
            self.expect(TokenKind::Endif)?;
            let id = session.next_node_id();
            Ok(Node::new(NodeKind::IfCommand, id).with_children(vec![cond, then_branch]))
        }
    }

    fn while_command(&mut self, session: &mut Session) -> Result<Node, Diagnostic> {
        self.expect(TokenKind::While)?;
        let cond = self.condition(session)?;
        self.expect(TokenKind::Do)?;
        let body = self.commands(session)?;
        self.expect(TokenKind::Endwhile)?;
        let id = session.next_node_id();
        Ok(Node::new(NodeKind::WhileCommand, id).with_children(vec![cond, body]))
    }

    fn repeat_command(&mut self, session: &mut Session) -> Result<Node, Diagnostic> {
        self.expect(TokenKind::Repeat)?;
        let body = self.commands(session)?;
        self.expect(TokenKind::Until)?;
        let cond = self.condition(session)?;
        self.expect(TokenKind::Semicolon)?;
        let id = session.next_node_id();
        Ok(Node::new(NodeKind::RepeatCommand, id).with_children(vec![body, cond]))
    }

    fn for_command(&mut self, session: &mut Session) -> Result<Node, Diagnostic> {
        self.expect(TokenKind::For)?;
        let iter_tok = self.expect(TokenKind::Identifier)?;
        self.expect(TokenKind::From)?;
        let lo = self.value(session)?;
        let downto = if self.eat(TokenKind::To) {
            false
        } else {
            self.expect(TokenKind::Downto)?;
            true
        };
        let hi = self.value(session)?;
        self.expect(TokenKind::Do)?;
        let body = self.commands(session)?;
        self.expect(TokenKind::Endfor)?;

        let id = session.next_node_id();
        let kind = if downto {
            NodeKind::ForDownToCommand
        } else {
            NodeKind::ForToCommand
        };
        Ok(Node::new(kind, id)
            .with_anchor(iter_tok.shared())
            .with_children(vec![lo, hi, body]))
    }

    fn read_command(&mut self, session: &mut Session) -> Result<Node, Diagnostic> {
        self.expect(TokenKind::Read)?;
        let target = self.identifier_ref(session)?;
        self.expect(TokenKind::Semicolon)?;
        let id = session.next_node_id();
        Ok(Node::new(NodeKind::ReadCommand, id).with_children(vec![target]))
    }

    fn write_command(&mut self, session: &mut Session) -> Result<Node, Diagnostic> {
        self.expect(TokenKind::Write)?;
        let value = self.value(session)?;
        self.expect(TokenKind::Semicolon)?;
        let id = session.next_node_id();
        Ok(Node::new(NodeKind::WriteCommand, id).with_children(vec![value]))
    }

    // An assignment's or read's left-hand side: a bare identifier or an
    // indexed array element. Returns an IDENTIFIER or TABLE node directly
    // (not wrapped in VALUE, since lvalues are never themselves expressions).
    fn identifier_ref(&mut self, session: &mut Session) -> Result<Node, Diagnostic> {
        let name_tok = self.expect(TokenKind::Identifier)?;
        if self.eat(TokenKind::LBracket) {
            let index = self.index_value(session)?;
            self.expect(TokenKind::RBracket)?;
            let id = session.next_node_id();
            Ok(Node::new(NodeKind::Table, id)
                .with_anchor(name_tok.shared())
                .with_children(vec![index]))
        } else {
            let id = session.next_node_id();
            Ok(Node::new(NodeKind::Identifier, id).with_anchor(name_tok.shared()))
        }
    }

    // An array index is either a variable or a literal number.
    fn index_value(&mut self, session: &mut Session) -> Result<Node, Diagnostic> {
        if self.check(TokenKind::Number) || self.check(TokenKind::Minus) {
            let tok = self.signed_number()?;
            let id = session.next_node_id();
            Ok(Node::new(NodeKind::Number, id).with_anchor(tok.shared()))
        } else {
            let tok = self.expect(TokenKind::Identifier)?;
            let id = session.next_node_id();
            Ok(Node::new(NodeKind::Identifier, id).with_anchor(tok.shared()))
        }
    }

    // value -> NUM | '-' NUM | '(' value ')' | identifier_ref, wrapped in a
    // VALUE node.
    fn value(&mut self, session: &mut Session) -> Result<Node, Diagnostic> {
        let inner = self.value_inner(session)?;
        let id = session.next_node_id();
        Ok(Node::new(NodeKind::Value, id).with_children(vec![inner]))
    }

    fn value_inner(&mut self, session: &mut Session) -> Result<Node, Diagnostic> {
        if self.check(TokenKind::LParen) {
            self.advance();
            let inner = self.value_inner(session)?;
            self.expect(TokenKind::RParen)?;
            return Ok(inner);
        }
        if self.check(TokenKind::Number) || self.check(TokenKind::Minus) {
            let tok = self.signed_number()?;
            let id = session.next_node_id();
            return Ok(Node::new(NodeKind::Number, id).with_anchor(tok.shared()));
        }
        self.identifier_ref(session)
    }

    // expression -> value (op value)?
    fn expression(&mut self, session: &mut Session) -> Result<Node, Diagnostic> {
        let lhs = self.value(session)?;
        let op = match self.peek_kind() {
            TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::Percent => Some(self.advance()),
            _ => None,
        };
        let id = session.next_node_id();
        match op {
            None => Ok(Node::new(NodeKind::Expression, id).with_children(vec![lhs])),
            Some(op_tok) => {
                let rhs = self.value(session)?;
                Ok(Node::new(NodeKind::Expression, id)
                    .with_anchor(op_tok.shared())
                    .with_children(vec![lhs, rhs]))
            }
        }
    }

    // condition -> value relop value
    fn condition(&mut self, session: &mut Session) -> Result<Node, Diagnostic> {
        let lhs = self.value(session)?;
        let op_tok = match self.peek_kind() {
            TokenKind::Lt
            | TokenKind::Lte
            | TokenKind::Eq
            | TokenKind::Gte
            | TokenKind::Gt
            | TokenKind::Neq => self.advance(),
            _ => return Err(self.err("expected a comparison operator")),
        };
        let rhs = self.value(session)?;
        let id = session.next_node_id();
        Ok(Node::new(NodeKind::Condition, id)
            .with_anchor(op_tok.shared())
            .with_children(vec![lhs, rhs]))
    }
}
