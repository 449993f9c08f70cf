//! Tokenizer implementation.
//!
//! The top-level token stream treats every `{ ... }` region as a single
//! freeform token. The regions whose contents are FSM statements are
//! tokenized again afterwards, see [`crate::relex`].

use crate::error::{Error, LexErrorKind};
use logos::Logos;
use std::fmt;

/// Keywords of the FSM definition language.
pub const FSM_KEYWORDS: &[&str] = &[
    "header", "cpp", "fsm", "class", "as", "before", "after", "allow", "forbid",
];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Id,
    Freeform,
    Symbol,
    Keyword,
    Eof,
    LineComment,
    BlockComment,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Token<'src> {
    pub line: usize,
    pub kind: TokenKind,
    pub lexeme: &'src str,
}

impl<'src> Token<'src> {
    pub const fn new(line: usize, kind: TokenKind, lexeme: &'src str) -> Self {
        Self { line, kind, lexeme }
    }

    pub fn is_symbol(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Symbol && self.lexeme == symbol
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Keyword && self.lexeme == keyword
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.kind, TokenKind::LineComment | TokenKind::BlockComment)
    }

    /// The text of a freeform token without its enclosing braces.
    pub fn freeform_body(&self) -> Option<&'src str> {
        if self.kind != TokenKind::Freeform {
            return None;
        }
        self.lexeme.strip_prefix('{')?.strip_suffix('}')
    }

    /// The line on which this token ends.
    pub fn end_line(&self) -> usize {
        self.line + self.lexeme.matches('\n').count()
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => f.write_str("end of input"),
            TokenKind::Freeform => f.write_str("freeform block"),
            _ => write!(f, "`{}'", self.lexeme),
        }
    }
}

/// Tokenizer configuration.
#[derive(Debug, Clone)]
pub struct LexerConfig {
    keywords: Vec<&'static str>,
}

impl LexerConfig {
    pub fn new<I>(keywords: I) -> Self
    where
        I: IntoIterator<Item = &'static str>,
    {
        Self {
            keywords: keywords.into_iter().collect(),
        }
    }

    pub fn is_keyword(&self, ident: &str) -> bool {
        self.keywords.iter().any(|kw| *kw == ident)
    }
}

impl Default for LexerConfig {
    fn default() -> Self {
        Self::new(FSM_KEYWORDS.iter().copied())
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Extras {
    // Offset of the offending character when a callback fails.
    error_at: Option<usize>,
}

#[derive(Debug, Copy, Clone, PartialEq, Logos)]
#[logos(error = LexErrorKind)]
#[logos(extras = Extras)]
#[logos(skip r"[ \t\r\n\f]+")]
enum RawToken {
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    #[token("=>")]
    #[token("(")]
    #[token(")")]
    #[token(";")]
    #[token(",")]
    Symbol,

    #[token("{", freeform)]
    Freeform,

    #[regex(r"//[^\n]*")]
    LineComment,

    #[token("/*", block_comment)]
    BlockComment,
}

fn freeform(lexer: &mut logos::Lexer<RawToken>) -> Result<(), LexErrorKind> {
    let base = lexer.span().end;
    let rest = lexer.remainder();
    match scan_freeform(rest) {
        Ok(len) => {
            lexer.bump(len);
            Ok(())
        }
        Err((offset, kind)) => {
            lexer.extras.error_at = offset.map(|offset| base + offset);
            lexer.bump(rest.len());
            Err(kind)
        }
    }
}

fn block_comment(lexer: &mut logos::Lexer<RawToken>) -> Result<(), LexErrorKind> {
    let rest = lexer.remainder();
    match rest.find("*/") {
        Some(pos) => {
            lexer.bump(pos + 2);
            Ok(())
        }
        None => {
            lexer.bump(rest.len());
            Err(LexErrorKind::UnterminatedComment)
        }
    }
}

/// Find the length of a freeform body up to and including its closing brace.
///
/// Braces inside string/character literals and comments do not count. On
/// failure, returns the offset of the offending character when it is not the
/// opening brace itself.
fn scan_freeform(text: &str) -> Result<usize, (Option<usize>, LexErrorKind)> {
    let bytes = text.as_bytes();
    let mut depth = 1usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i + 1);
                }
            }
            b'\'' if is_digit_separator(bytes, i) => (),
            quote @ (b'"' | b'\'') => {
                i = skip_literal(bytes, i, quote)
                    .ok_or((Some(i), LexErrorKind::UnterminatedLiteral))?;
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = bytes[i..]
                    .iter()
                    .position(|&b| b == b'\n')
                    .map_or(bytes.len(), |n| i + n);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = text[i + 2..]
                    .find("*/")
                    .map(|n| i + 2 + n + 2)
                    .ok_or((Some(i), LexErrorKind::UnterminatedComment))?;
                continue;
            }
            _ => (),
        }
        i += 1;
    }
    Err((None, LexErrorKind::UnterminatedFreeform))
}

/// Whether the `'` at `at` separates digits of a number literal (`1'000`)
/// rather than opening a character literal (`L'x'`).
pub(crate) fn is_digit_separator(bytes: &[u8], at: usize) -> bool {
    let word = bytes[..at]
        .iter()
        .rposition(|&b| !(b == b'_' || b == b'\'' || b.is_ascii_alphanumeric()))
        .map_or(0, |n| n + 1);
    bytes.get(word).map_or(false, u8::is_ascii_digit) && word < at
}

// Returns the offset just past the closing quote.
fn skip_literal(bytes: &[u8], start: usize, quote: u8) -> Option<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return None,
            b if b == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

/// Maps byte offsets to 1-based line numbers.
#[derive(Debug)]
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let starts = Some(0)
            .into_iter()
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { starts }
    }

    fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&start| start <= offset)
    }
}

/// A restartable tokenizer over a source text.
#[derive(Debug)]
pub struct Tokenizer<'src, 'cfg> {
    source: &'src str,
    first_line: usize,
    config: &'cfg LexerConfig,
    lines: LineIndex,
}

impl<'src, 'cfg> Tokenizer<'src, 'cfg> {
    pub fn new(source: &'src str, config: &'cfg LexerConfig) -> Self {
        Self::with_first_line(source, 1, config)
    }

    /// Create a tokenizer whose first line is numbered `first_line`.
    pub fn with_first_line(source: &'src str, first_line: usize, config: &'cfg LexerConfig) -> Self {
        Self {
            source,
            first_line,
            config,
            lines: LineIndex::new(source),
        }
    }

    /// Start a new pass over the source, comments included.
    pub fn tokens(&self) -> Tokens<'_, 'src, 'cfg> {
        Tokens {
            tokenizer: self,
            lexer: RawToken::lexer(self.source),
            finished: false,
        }
    }

    fn line_at(&self, offset: usize) -> usize {
        self.first_line + self.lines.line_of(offset) - 1
    }
}

/// The token stream produced by [`Tokenizer::tokens`], terminated by a single
/// `Eof` token. The stream stops after the first error.
pub struct Tokens<'t, 'src, 'cfg> {
    tokenizer: &'t Tokenizer<'src, 'cfg>,
    lexer: logos::Lexer<'src, RawToken>,
    finished: bool,
}

impl<'src> Iterator for Tokens<'_, 'src, '_> {
    type Item = Result<Token<'src>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let source = self.tokenizer.source;
        let Some(res) = self.lexer.next() else {
            self.finished = true;
            let line = self.tokenizer.line_at(source.len());
            return Some(Ok(Token::new(line, TokenKind::Eof, "")));
        };

        let span = self.lexer.span();
        match res {
            Ok(raw) => {
                let lexeme = self.lexer.slice();
                let kind = match raw {
                    RawToken::Ident if self.tokenizer.config.is_keyword(lexeme) => {
                        TokenKind::Keyword
                    }
                    RawToken::Ident => TokenKind::Id,
                    RawToken::Symbol => TokenKind::Symbol,
                    RawToken::Freeform => TokenKind::Freeform,
                    RawToken::LineComment => TokenKind::LineComment,
                    RawToken::BlockComment => TokenKind::BlockComment,
                };
                Some(Ok(Token::new(self.tokenizer.line_at(span.start), kind, lexeme)))
            }
            Err(kind) => {
                self.finished = true;
                let offset = self.lexer.extras.error_at.take().unwrap_or(span.start);
                let kind = match kind {
                    LexErrorKind::Unrecognized => LexErrorKind::InvalidCharacter(
                        source[span.start..].chars().next().unwrap_or('\0'),
                    ),
                    kind => kind,
                };
                Some(Err(Error::new(self.tokenizer.line_at(offset), kind)))
            }
        }
    }
}

/// Tokenize `source` into a buffer, dropping comments.
///
/// The returned buffer always ends with an `Eof` token.
pub fn tokenize<'src>(
    source: &'src str,
    first_line: usize,
    config: &LexerConfig,
) -> Result<Vec<Token<'src>>, Error> {
    let tokenizer = Tokenizer::with_first_line(source, first_line, config);
    let mut tokens = vec![];
    for token in tokenizer.tokens() {
        let token = token?;
        if token.is_comment() {
            continue;
        }
        tokens.push(token);
    }
    tracing::trace!("tokenized {} tokens from line {}", tokens.len(), first_line);
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use TokenKind::*;

    fn kinds<'a>(tokens: &'a [Token<'a>]) -> Vec<(TokenKind, &'a str)> {
        tokens.iter().map(|t| (t.kind, t.lexeme)).collect()
    }

    fn lex_error(source: &str) -> (usize, LexErrorKind) {
        let err = tokenize(source, 1, &LexerConfig::default()).unwrap_err();
        match err.kind() {
            ErrorKind::Lex(kind) => (err.line(), kind.clone()),
            kind => panic!("unexpected error kind: {:?}", kind),
        }
    }

    #[test]
    fn smoketest() {
        let input = "\
header { #include \"ctx.h\" } // trailing comment
fsm Door /* the door */ {
    class Ctx as ctx;
}
";
        let tokens = tokenize(input, 1, &LexerConfig::default()).unwrap();
        assert_eq!(
            kinds(&tokens),
            [
                (Keyword, "header"),
                (Freeform, "{ #include \"ctx.h\" }"),
                (Keyword, "fsm"),
                (Id, "Door"),
                (Freeform, "{\n    class Ctx as ctx;\n}"),
                (Eof, ""),
            ]
        );
        let lines: Vec<_> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, [1, 1, 2, 2, 2, 5]);
    }

    #[test]
    fn comments_are_yielded_by_the_raw_stream() {
        let config = LexerConfig::default();
        let tokenizer = Tokenizer::new("a // x\n/* y */ b", &config);
        let tokens: Vec<_> = tokenizer.tokens().collect::<Result<_, _>>().unwrap();
        assert_eq!(
            kinds(&tokens),
            [
                (Id, "a"),
                (LineComment, "// x"),
                (BlockComment, "/* y */"),
                (Id, "b"),
                (Eof, ""),
            ]
        );

        // restarting yields the same stream.
        let again: Vec<_> = tokenizer.tokens().collect::<Result<_, _>>().unwrap();
        assert_eq!(tokens, again);
    }

    #[test]
    fn symbols_and_keywords() {
        let tokens = tokenize("go(int n) => B; as x, y", 1, &LexerConfig::default()).unwrap();
        assert_eq!(
            kinds(&tokens),
            [
                (Id, "go"),
                (Symbol, "("),
                (Id, "int"),
                (Id, "n"),
                (Symbol, ")"),
                (Symbol, "=>"),
                (Id, "B"),
                (Symbol, ";"),
                (Keyword, "as"),
                (Id, "x"),
                (Symbol, ","),
                (Id, "y"),
                (Eof, ""),
            ]
        );
    }

    #[test]
    fn custom_keyword_set() {
        let config = LexerConfig::new(["state"]);
        let tokens = tokenize("state fsm", 1, &config).unwrap();
        assert_eq!(kinds(&tokens), [(Keyword, "state"), (Id, "fsm"), (Eof, "")]);
    }

    #[test]
    fn nested_freeform_is_captured_whole() {
        let input = "x { a { b { c } } { d } } y";
        let tokens = tokenize(input, 1, &LexerConfig::default()).unwrap();
        assert_eq!(
            kinds(&tokens),
            [
                (Id, "x"),
                (Freeform, "{ a { b { c } } { d } }"),
                (Id, "y"),
                (Eof, ""),
            ]
        );
        assert_eq!(tokens[1].freeform_body(), Some(" a { b { c } } { d } "));
    }

    #[test]
    fn braces_in_literals_and_comments_are_ignored() {
        let input = "{ puts(\"}\"); char c = '{'; // }\n /* { */ }";
        let tokens = tokenize(input, 1, &LexerConfig::default()).unwrap();
        assert_eq!(kinds(&tokens), [(Freeform, input), (Eof, "")]);
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn digit_separators_do_not_open_literals() {
        let input = "{ int k = 1'000; long m = 0x7fff'ffff; char c = L'}'; }";
        let tokens = tokenize(input, 1, &LexerConfig::default()).unwrap();
        assert_eq!(kinds(&tokens), [(Freeform, input), (Eof, "")]);

        assert!(is_digit_separator(b"1'000", 1));
        assert!(is_digit_separator(b"x = 1'000'000", 9));
        assert!(!is_digit_separator(b"c = 'a'", 4));
        assert!(!is_digit_separator(b"L'x'", 1));
        assert!(!is_digit_separator(b"'", 0));
    }

    #[test]
    fn first_line_offsets_line_numbers() {
        let tokens = tokenize("a\n\nb", 10, &LexerConfig::default()).unwrap();
        let lines: Vec<_> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, [10, 12, 12]);
    }

    #[test]
    fn unbalanced_freeform_fails() {
        assert_eq!(
            lex_error("a\nb { { }\n"),
            (2, LexErrorKind::UnterminatedFreeform)
        );
    }

    #[test]
    fn invalid_character_fails() {
        assert_eq!(lex_error("a\n  $"), (2, LexErrorKind::InvalidCharacter('$')));
        assert_eq!(lex_error("}"), (1, LexErrorKind::InvalidCharacter('}')));
    }

    #[test]
    fn unterminated_constructs_fail() {
        assert_eq!(lex_error("a /* b\n"), (1, LexErrorKind::UnterminatedComment));
        assert_eq!(
            lex_error("{\n  s = \"abc\n}"),
            (2, LexErrorKind::UnterminatedLiteral)
        );
        assert_eq!(
            lex_error("{\n\n /* } "),
            (3, LexErrorKind::UnterminatedComment)
        );
    }
}
