//! Re-tokenization of freeform blocks that hold FSM statements.
//!
//! The top-level tokenizer keeps every `{ ... }` region opaque. Two
//! positions carry FSM statements rather than target-language code: the
//! body following `fsm ID` and each state body (`ID { ... }`). Their
//! freeform token is replaced in place by its own token stream, wrapped in
//! synthetic `{` / `}` symbols. Freeform blocks nested inside a spliced
//! body are left alone.

use crate::{
    error::Error,
    lexer::{self, LexerConfig, Token, TokenKind},
};

/// Explode the FSM body, then every state body.
pub fn explode(tokens: &mut Vec<Token<'_>>, config: &LexerConfig) -> Result<(), Error> {
    explode_fsm_body(tokens, config)?;
    explode_state_bodies(tokens, config)?;
    Ok(())
}

/// Replace the freeform in every `fsm ID { ... }` occurrence.
pub fn explode_fsm_body(tokens: &mut Vec<Token<'_>>, config: &LexerConfig) -> Result<(), Error> {
    let mut i = 0;
    while i + 2 < tokens.len() {
        if tokens[i].is_keyword("fsm")
            && tokens[i + 1].kind == TokenKind::Id
            && tokens[i + 2].kind == TokenKind::Freeform
        {
            let inserted = splice(tokens, i + 2, config)?;
            i += 2 + inserted;
        } else {
            i += 1;
        }
    }
    Ok(())
}

/// Replace the freeform in every remaining `ID { ... }` occurrence.
pub fn explode_state_bodies(
    tokens: &mut Vec<Token<'_>>,
    config: &LexerConfig,
) -> Result<(), Error> {
    let mut i = 0;
    while i + 1 < tokens.len() {
        if tokens[i].kind == TokenKind::Id && tokens[i + 1].kind == TokenKind::Freeform {
            let inserted = splice(tokens, i + 1, config)?;
            i += 1 + inserted;
        } else {
            i += 1;
        }
    }
    Ok(())
}

/// Replace the freeform token at `at` and return the number of tokens
/// inserted in its place.
fn splice<'src>(
    tokens: &mut Vec<Token<'src>>,
    at: usize,
    config: &LexerConfig,
) -> Result<usize, Error> {
    let freeform = tokens[at];
    let Some(body) = freeform.freeform_body() else {
        return Ok(0);
    };

    let mut inner = lexer::tokenize(body, freeform.line, config)?;
    if matches!(inner.last(), Some(t) if t.kind == TokenKind::Eof) {
        inner.pop();
    }

    let mut replacement = Vec::with_capacity(inner.len() + 2);
    replacement.push(Token::new(freeform.line, TokenKind::Symbol, "{"));
    replacement.extend(inner);
    replacement.push(Token::new(freeform.end_line(), TokenKind::Symbol, "}"));

    let inserted = replacement.len();
    tracing::trace!(
        "splicing {} tokens at line {} (index {})",
        inserted,
        freeform.line,
        at
    );
    tokens.splice(at..=at, replacement);
    Ok(inserted)
}
