//! A compiler from finite-state machine definitions to C++ state machine
//! classes and Graphviz diagrams.

pub mod build;
pub mod codegen;
pub mod compile;
pub mod error;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod relex;
pub mod types;
pub mod util;
pub mod validate;

pub use crate::{
    compile::{compile_file, compile_str, Artifacts, Compiled, OutputPaths},
    error::{Error, ErrorKind},
};
