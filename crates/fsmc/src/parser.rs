//! Recursive-descent parser over the exploded token stream.
//!
//! ```text
//! fsm        := (("header"|"cpp") FREEFORM)* "fsm" ID "{"
//!               "class" ID "as" ID ";"
//!               (("before"|"after") FREEFORM)*
//!               state+ "}"
//! state      := ID "{" (("before"|"after") FREEFORM)* transition* "}"
//! transition := ID params? "=>" ( ID FREEFORM? ";" | step (("," | "=>") step)* ";" )
//! step       := ID "(" (ID ("," ID)*)? ")"
//! params     := "(" (ID ID ("," ID ID)*)? ")"
//! ```

use crate::{
    error::{Decl, Error, ErrorKind},
    lexer::{Token, TokenKind},
    model::{Arg, Direct, Fsm, Param, Sequence, State, Step, Transition, TransitionKind, Verbatim},
    types::Map,
};

/// Parse an exploded token stream into a sorted FSM model.
pub fn parse(tokens: &[Token<'_>]) -> Result<Fsm, Error> {
    let span = tracing::trace_span!("parse");
    let _entered = span.enter();

    let mut parser = Parser { tokens, pos: 0 };
    let mut fsm = parser.fsm()?;
    fsm.sort();
    tracing::debug!(
        "parsed fsm `{}' with {} states (begin = {})",
        fsm.id,
        fsm.states.len(),
        fsm.begin
    );
    Ok(fsm)
}

struct Parser<'t, 'src> {
    tokens: &'t [Token<'src>],
    pos: usize,
}

impl<'t, 'src> Parser<'t, 'src> {
    fn peek(&self, n: usize) -> Token<'src> {
        let last = self.tokens.len().saturating_sub(1);
        self.tokens
            .get(self.pos + n)
            .or_else(|| self.tokens.get(last))
            .copied()
            .unwrap_or(Token::new(1, TokenKind::Eof, ""))
    }

    fn bump(&mut self) -> Token<'src> {
        let token = self.peek(0);
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self, expected: impl Into<String>) -> Error {
        let found = self.peek(0);
        Error::new(
            found.line,
            ErrorKind::Parse {
                expected: expected.into(),
                found: found.to_string(),
            },
        )
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<Token<'src>, Error> {
        if self.peek(0).is_symbol(symbol) {
            Ok(self.bump())
        } else {
            Err(self.unexpected(format!("`{}'", symbol)))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<Token<'src>, Error> {
        if self.peek(0).is_keyword(keyword) {
            Ok(self.bump())
        } else {
            Err(self.unexpected(format!("`{}'", keyword)))
        }
    }

    fn expect_id(&mut self, what: &str) -> Result<Token<'src>, Error> {
        if self.peek(0).kind == TokenKind::Id {
            Ok(self.bump())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn expect_freeform(&mut self) -> Result<Verbatim, Error> {
        let token = self.peek(0);
        match token.freeform_body() {
            Some(text) => {
                self.bump();
                Ok(Verbatim {
                    line: token.line,
                    text: text.to_owned(),
                })
            }
            None => Err(self.unexpected("freeform block")),
        }
    }

    /// Parse a `keyword { ... }` block into `slot`, rejecting a second one.
    fn block(&mut self, slot: &mut Option<Verbatim>) -> Result<(), Error> {
        let keyword = self.bump();
        let block = self.expect_freeform()?;
        if slot.is_some() {
            return Err(Error::new(
                keyword.line,
                ErrorKind::Duplicate {
                    decl: Decl::Block,
                    id: keyword.lexeme.to_owned(),
                },
            ));
        }
        *slot = Some(block);
        Ok(())
    }

    fn fsm(&mut self) -> Result<Fsm, Error> {
        let mut header = None;
        let mut cpp = None;
        loop {
            let token = self.peek(0);
            if token.is_keyword("header") {
                self.block(&mut header)?;
            } else if token.is_keyword("cpp") {
                self.block(&mut cpp)?;
            } else {
                break;
            }
        }

        self.expect_keyword("fsm")?;
        let id = self.expect_id("fsm name")?;
        self.expect_symbol("{")?;

        self.expect_keyword("class")?;
        let class = self.expect_id("context class name")?;
        self.expect_keyword("as")?;
        let ctx = self.expect_id("context member name")?;
        self.expect_symbol(";")?;

        let mut before = None;
        let mut after = None;
        self.hooks(&mut before, &mut after)?;

        let mut begin = None;
        let mut states: Map<String, State> = Map::default();
        while self.peek(0).kind == TokenKind::Id {
            let state = self.state()?;
            if states.contains_key(&state.id) {
                return Err(Error::new(
                    state.line,
                    ErrorKind::Duplicate {
                        decl: Decl::State,
                        id: state.id,
                    },
                ));
            }
            begin.get_or_insert_with(|| state.id.clone());
            states.insert(state.id.clone(), state);
        }
        let begin = match begin {
            Some(begin) => begin,
            None => return Err(self.unexpected("state declaration")),
        };

        self.expect_symbol("}")?;
        if self.peek(0).kind != TokenKind::Eof {
            return Err(self.unexpected("end of input"));
        }

        Ok(Fsm {
            id: id.lexeme.to_owned(),
            line: id.line,
            header,
            cpp,
            class: class.lexeme.to_owned(),
            ctx: ctx.lexeme.to_owned(),
            before,
            after,
            begin,
            states,
        })
    }

    fn hooks(
        &mut self,
        before: &mut Option<Verbatim>,
        after: &mut Option<Verbatim>,
    ) -> Result<(), Error> {
        loop {
            let token = self.peek(0);
            if token.is_keyword("before") {
                self.block(before)?;
            } else if token.is_keyword("after") {
                self.block(after)?;
            } else {
                return Ok(());
            }
        }
    }

    fn state(&mut self) -> Result<State, Error> {
        let id = self.expect_id("state name")?;
        self.expect_symbol("{")?;

        let mut before = None;
        let mut after = None;
        self.hooks(&mut before, &mut after)?;

        let mut transitions: Map<String, Transition> = Map::default();
        while self.peek(0).kind == TokenKind::Id {
            let transition = self.transition()?;
            if transitions.contains_key(&transition.id) {
                return Err(Error::new(
                    transition.line,
                    ErrorKind::Duplicate {
                        decl: Decl::Transition,
                        id: transition.id,
                    },
                ));
            }
            transitions.insert(transition.id.clone(), transition);
        }
        self.expect_symbol("}")?;

        Ok(State {
            id: id.lexeme.to_owned(),
            line: id.line,
            before,
            after,
            transitions,
        })
    }

    fn transition(&mut self) -> Result<Transition, Error> {
        let id = self.expect_id("transition name")?;
        let params = if self.peek(0).is_symbol("(") {
            self.params()?
        } else {
            vec![]
        };

        let kind = if self.peek(0).is_symbol("=>")
            && self.peek(1).kind == TokenKind::Id
            && self.peek(2).is_symbol("(")
        {
            TransitionKind::Sequence(self.sequence()?)
        } else {
            TransitionKind::State(self.direct()?)
        };

        Ok(Transition {
            id: id.lexeme.to_owned(),
            line: id.line,
            params,
            kind,
        })
    }

    fn params(&mut self) -> Result<Vec<Param>, Error> {
        self.expect_symbol("(")?;
        let mut params = vec![];
        if !self.peek(0).is_symbol(")") {
            loop {
                let ty = self.expect_id("parameter type")?;
                let id = self.expect_id("parameter name")?;
                params.push(Param {
                    ty: ty.lexeme.to_owned(),
                    id: id.lexeme.to_owned(),
                    line: id.line,
                });
                if self.peek(0).is_symbol(",") {
                    self.bump();
                } else {
                    break;
                }
            }
        }
        self.expect_symbol(")")?;
        Ok(params)
    }

    fn direct(&mut self) -> Result<Direct, Error> {
        self.expect_symbol("=>")?;
        let target = self.expect_id("target state")?;
        let precondition = if self.peek(0).kind == TokenKind::Freeform {
            Some(self.expect_freeform()?)
        } else {
            None
        };
        self.expect_symbol(";")?;
        Ok(Direct {
            target: target.lexeme.to_owned(),
            target_line: target.line,
            precondition,
        })
    }

    fn sequence(&mut self) -> Result<Sequence, Error> {
        self.expect_symbol("=>")?;
        let mut steps = vec![self.step()?];
        while self.peek(0).is_symbol(",") || self.peek(0).is_symbol("=>") {
            self.bump();
            steps.push(self.step()?);
        }
        self.expect_symbol(";")?;
        Ok(Sequence {
            steps,
            resolved: None,
        })
    }

    fn step(&mut self) -> Result<Step, Error> {
        let id = self.expect_id("transition call")?;
        self.expect_symbol("(")?;
        let mut args = vec![];
        if !self.peek(0).is_symbol(")") {
            loop {
                let arg = self.expect_id("argument")?;
                args.push(Arg {
                    id: arg.lexeme.to_owned(),
                    line: arg.line,
                });
                if self.peek(0).is_symbol(",") {
                    self.bump();
                } else {
                    break;
                }
            }
        }
        self.expect_symbol(")")?;
        Ok(Step {
            id: id.lexeme.to_owned(),
            line: id.line,
            args,
        })
    }
}
