//! Generation of the state machine class and its graph.

mod graph;
mod header;
mod source;

use crate::{
    lexer::is_digit_separator,
    model::{Fsm, Verbatim},
    util::{display_fn, escape_c_str},
};
use std::fmt::{self, Write as _};

/// Guard macro for the tracing helpers in generated code.
pub const DEBUG_MACRO: &str = "FSM_DEBUG";

/// Renders a validated [`Fsm`] into its three output artifacts.
#[derive(Debug)]
pub struct Codegen<'a> {
    fsm: &'a Fsm,
    source_path: &'a str,
    base_name: &'a str,
}

impl<'a> Codegen<'a> {
    /// `source_path` is referenced by the line markers, `base_name` is the
    /// file name (without extension) shared by the generated files.
    pub fn new(fsm: &'a Fsm, source_path: &'a str, base_name: &'a str) -> Self {
        Self {
            fsm,
            source_path,
            base_name,
        }
    }

    /// The class declaration (`.h`).
    pub fn header(&self) -> impl fmt::Display + '_ {
        display_fn(move |f| header::write(self, &mut Output::new(f, self.file_name("h"))))
    }

    /// The class definition (`.cpp`).
    pub fn source(&self) -> impl fmt::Display + '_ {
        display_fn(move |f| source::write(self, &mut Output::new(f, self.file_name("cpp"))))
    }

    /// The Graphviz description of the direct transitions (`.dot`).
    pub fn graph(&self) -> impl fmt::Display + '_ {
        display_fn(move |f| graph::write(self, &mut Output::new(f, self.file_name("dot"))))
    }

    fn file_name(&self, ext: &str) -> String {
        format!("{}.{}", self.base_name, ext)
    }

    fn banner(&self, f: &mut Output<'_, '_>) -> fmt::Result {
        writeln!(
            f,
            "// Generated by fsmc from {}. Do not edit.",
            self.source_path
        )
    }

    /// Write a verbatim block preceded by its line marker.
    fn verbatim(&self, f: &mut Output<'_, '_>, block: &Verbatim) -> fmt::Result {
        self.verbatim_text(f, block.line, &block.text)
    }

    /// Write `text` attributed to `line` of the source file, then switch the
    /// attribution back to the generated file.
    fn verbatim_text(&self, f: &mut Output<'_, '_>, line: usize, text: &str) -> fmt::Result {
        writeln!(f, "#line {} \"{}\"", line, escape_c_str(self.source_path))?;
        writeln!(f, "{}", text)?;
        // the marker names the line that follows it.
        let next = f.line() + 2;
        let file_name = escape_c_str(&f.file_name);
        writeln!(f, "#line {} \"{}\"", next, file_name)
    }
}

/// A formatter that tracks the number of lines written so far.
struct Output<'f, 'a> {
    f: &'f mut fmt::Formatter<'a>,
    file_name: String,
    lines: usize,
}

impl<'f, 'a> Output<'f, 'a> {
    fn new(f: &'f mut fmt::Formatter<'a>, file_name: String) -> Self {
        Self {
            f,
            file_name,
            lines: 0,
        }
    }

    /// The number of complete lines written.
    fn line(&self) -> usize {
        self.lines
    }
}

impl fmt::Write for Output<'_, '_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.lines += s.matches('\n').count();
        self.f.write_str(s)
    }
}

/// Rewrite the `allow` / `forbid` keywords of a precondition block.
///
/// Only whole identifiers outside string and character literals are replaced.
pub fn rewrite_precondition(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut chars = text.char_indices().peekable();
    while let Some((start, ch)) = chars.next() {
        if ch == '"' || (ch == '\'' && !is_digit_separator(text.as_bytes(), start)) {
            out.push(ch);
            while let Some((_, c)) = chars.next() {
                out.push(c);
                if c == '\\' {
                    if let Some((_, escaped)) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == ch {
                    break;
                }
            }
        } else if ch == '_' || ch.is_ascii_alphabetic() {
            let mut end = start + ch.len_utf8();
            while let Some(&(i, c)) = chars.peek() {
                if c == '_' || c.is_ascii_alphanumeric() {
                    end = i + c.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            match &text[start..end] {
                "allow" => out.push_str("return true"),
                "forbid" => out.push_str("return false"),
                ident => out.push_str(ident),
            }
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lexer, lexer::LexerConfig, parser, relex, validate};

    pub(super) fn load(source: &str) -> Fsm {
        let config = LexerConfig::default();
        let mut tokens = lexer::tokenize(source, 1, &config).unwrap();
        relex::explode(&mut tokens, &config).unwrap();
        let mut fsm = parser::parse(&tokens).unwrap();
        validate::validate(&mut fsm).unwrap();
        fsm
    }

    pub(super) const DOOR: &str = "\
header { #include \"door_ctx.h\" }
cpp { static int count; }
fsm Door {
    class DoorCtx as ctx;
    before { ctx.lock(); }
    Open {
        close() => Closed;
    }
    Closed {
        after { ctx.log(); }
        open(int force) => Open { if (force > 2) allow; forbid; };
        lock() => Locked;
    }
    Locked {
        unlock() => Closed;
        kick(int force) => unlock(), open(force), close();
    }
}
";

    #[test]
    fn rewrite_precondition_on_identifier_boundaries() {
        assert_eq!(
            rewrite_precondition(" if (x) allow; forbid; "),
            " if (x) return true; return false; "
        );
        assert_eq!(
            rewrite_precondition("allowed(); do_forbid(); puts(\"allow\");"),
            "allowed(); do_forbid(); puts(\"allow\");"
        );
        assert_eq!(rewrite_precondition("c = 'a'; allow;"), "c = 'a'; return true;");
        assert_eq!(
            rewrite_precondition("if (n > 1'000) forbid; allow;"),
            "if (n > 1'000) return false; return true;"
        );
    }

    #[test]
    fn output_is_deterministic() {
        let reordered = DOOR.replace(
            "        open(int force) => Open { if (force > 2) allow; forbid; };\n        lock() => Locked;\n",
            "        lock() => Locked;\n        open(int force) => Open { if (force > 2) allow; forbid; };\n",
        );
        assert_ne!(reordered, DOOR);

        let a = load(DOOR);
        let b = load(DOOR);
        let c = load(&reordered);
        let render = |fsm: &Fsm| {
            let cg = Codegen::new(fsm, "/src/door.fsm", "door");
            let rendered = (
                cg.header().to_string(),
                cg.source().to_string(),
                cg.graph().to_string(),
            );
            rendered
        };
        assert_eq!(render(&a), render(&b));
        // Only line markers differ when declarations are reordered.
        assert_eq!(render(&a).0, render(&c).0);
        assert_eq!(render(&a).2, render(&c).2);
    }
}
