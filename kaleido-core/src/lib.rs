//! Core front end for the Kaleido expression language.
//!
//! The pipeline is:
//!
//!   characters
//!     -> lexer    (one token at a time)
//!     -> parser   (top-level constructs: def / extern / expression)
//!     -> lower    (name and arity resolution, IR emission)
//!     -> ir       (LLVM-style module, verifier and printer)
//!
//! The CLI and tests drive the pipeline through [`Driver`] or the
//! [`compile`] / [`emit_llvm_ir`] helpers rather than wiring the stages
//! together themselves.

// ---------------------------------------------------------------------
// Error handling and configuration
// ---------------------------------------------------------------------

pub mod config;
pub mod error;

// ---------------------------------------------------------------------
// Front-end: lexing and parsing
// ---------------------------------------------------------------------

pub mod ast;
pub mod lexer;
pub mod parser;

// ---------------------------------------------------------------------
// Back-end: IR, lowering and compiler orchestration
// ---------------------------------------------------------------------

pub mod compiler;
pub mod ir;
pub mod lower;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use compiler::{CompilationArtifact, Driver, Event, compile, emit_llvm_ir};
pub use config::{FrontendConfig, PrecedenceTable};
pub use error::{CoreError, LexError, LowerError, ParseError};
