//! The compilation pipeline: tokenize, explode, parse, validate, emit.

use crate::{
    codegen::Codegen,
    error::Error,
    lexer::{self, LexerConfig},
    model::Fsm,
    parser, relex, validate,
};
use anyhow::Context as _;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

/// The generated files of one compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifacts {
    pub header: String,
    pub source: String,
    pub graph: String,
}

/// Parse and validate `source` into a model.
pub fn analyze(source: &str, config: &LexerConfig) -> Result<Fsm, Error> {
    let s = Instant::now();
    let mut tokens = lexer::tokenize(source, 1, config)?;
    relex::explode(&mut tokens, config)?;
    tracing::debug!("tokenize: {} tokens, {:?} elapsed", tokens.len(), s.elapsed());

    let s = Instant::now();
    let mut fsm = parser::parse(&tokens)?;
    validate::validate(&mut fsm)?;
    tracing::debug!("parse + validate: {:?} elapsed", s.elapsed());

    Ok(fsm)
}

/// Compile `source`. `source_path` is quoted in banners and line markers,
/// `base_name` names the generated header included by the definition.
pub fn compile_str(source: &str, source_path: &str, base_name: &str) -> Result<Artifacts, Error> {
    let fsm = analyze(source, &LexerConfig::default())?;
    let codegen = Codegen::new(&fsm, source_path, base_name);
    let artifacts = Artifacts {
        header: codegen.header().to_string(),
        source: codegen.source().to_string(),
        graph: codegen.graph().to_string(),
    };
    Ok(artifacts)
}

/// The result of compiling an input file.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    /// The absolute path of the input.
    pub in_file: PathBuf,
    pub artifacts: Artifacts,
}

/// Compile the file at `path`.
///
/// Diagnostics carry the absolute path of the input. I/O failures are
/// reported with context.
pub fn compile_file(path: &Path) -> anyhow::Result<Compiled> {
    let in_file = fs::canonicalize(path)
        .with_context(|| format!("failed to resolve the input file {}", path.display()))?;
    let source = fs::read_to_string(&in_file)
        .with_context(|| format!("failed to read {}", in_file.display()))?;
    let base_name = OutputPaths::base_name(&in_file)?;

    let artifacts = compile_str(&source, &in_file.display().to_string(), &base_name)
        .map_err(|err| err.with_path(&in_file))?;
    Ok(Compiled { in_file, artifacts })
}

/// Where the generated files of an input go.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    pub header: PathBuf,
    pub source: PathBuf,
    pub graph: PathBuf,
}

impl OutputPaths {
    /// Derive the output paths from `input`, placing them in `out_dir` when
    /// given and next to the input otherwise.
    pub fn new(input: &Path, out_dir: Option<&Path>) -> anyhow::Result<Self> {
        let (dir, base) = Self::split(input)?;
        let dir = out_dir.map_or(dir, Path::to_path_buf);
        Ok(Self {
            header: dir.join(format!("{}.h", base)),
            source: dir.join(format!("{}.cpp", base)),
            graph: dir.join(format!("{}.dot", base)),
        })
    }

    /// Split `path` into its directory and its file name without extension.
    pub fn split(path: &Path) -> anyhow::Result<(PathBuf, String)> {
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok((dir, Self::base_name(path)?))
    }

    fn base_name(path: &Path) -> anyhow::Result<String> {
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .with_context(|| format!("invalid input file name: {}", path.display()))?;
        Ok(stem.to_owned())
    }
}
