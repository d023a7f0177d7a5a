//! Core of the epigen toolchain.
//!
//! The pipeline is roughly:
//!
//!   source .epi
//!     -> lexer      (tokens)
//!     -> parser     (per-file symbol registry + attributes)
//!     -> linker     (merged registry, resolved references)
//!     -> codegen    (.h / .cpp / .hxx / .cxx, incremental)
//!
//! The CLI is a thin layer over [`compile`] and the build-system helpers
//! [`dependencies`] and [`outputs`].

// ---------------------------------------------------------------------
// Error handling and diagnostics
// ---------------------------------------------------------------------

pub mod diagnostic;
pub mod error;

// ---------------------------------------------------------------------
// Front-end: tokens, symbols and parsing
// ---------------------------------------------------------------------

pub mod token;
pub mod lexer;
pub mod symbol;
pub mod attr;
pub mod parser;

// ---------------------------------------------------------------------
// Linking
// ---------------------------------------------------------------------

pub mod inheritance;
pub mod linker;

// ---------------------------------------------------------------------
// Back-end: incremental code generation
// ---------------------------------------------------------------------

pub mod file_system;
pub mod cache;
pub mod template;
pub mod emitter;
pub mod codegen;

// ---------------------------------------------------------------------
// Configuration and orchestration
// ---------------------------------------------------------------------

pub mod config;
pub mod compiler;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use codegen::{Artifact, CodeGenerator};
pub use compiler::{CompileReport, SourceFile, build_registry, compile, dependencies, discover_sources, outputs};
pub use config::{Config, Manifest};
pub use diagnostic::Diagnostic;
pub use error::CoreError;
pub use file_system::{FileSystem, MemoryFileSystem, OsFileSystem};
pub use lexer::tokenize;
pub use linker::Linker;
pub use parser::parse;
pub use symbol::{Registry, Symbol};
pub use template::{BuiltinTemplates, Render};
