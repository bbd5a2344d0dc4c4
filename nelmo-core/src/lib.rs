//! Core of the Nelmo toolchain: a small Elm-flavoured language that
//! compiles to JavaScript.
//!
//! The pipeline is roughly:
//!
//!   source .elm
//!     -> lexer      (tokens, off-side rule)
//!     -> parser     (typed expression tree, checked against the context)
//!     -> codegen_js (JavaScript statements)
//!
//! The same tree can be run directly with the evaluator in `eval`.
//! The CLI should depend on this crate rather than reimplementing the
//! pipeline.

// ---------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------

pub mod span;
pub mod error;

// ---------------------------------------------------------------------
// Front-end: lexing and parsing
// ---------------------------------------------------------------------

pub mod lexer;
pub mod parser;
pub mod ast;

// ---------------------------------------------------------------------
// Semantic layers: types and the compile-time context
// ---------------------------------------------------------------------

pub mod types;
pub mod context;

// ---------------------------------------------------------------------
// Back-ends: JavaScript generation, evaluation and orchestration
// ---------------------------------------------------------------------

pub mod codegen_js;
pub mod value;
pub mod eval;
pub mod compiler;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use ast::Expr;
pub use compiler::{
    compile_exprs, compile_source, evaluate_exprs, evaluate_program, evaluate_program_in,
    evaluate_source, evaluate_source_in, parse_source, parse_source_with,
};
pub use context::Context;
pub use error::CoreError;
pub use eval::Environment;
pub use parser::{Parsed, Parser};
pub use types::Type;
pub use value::Value;
