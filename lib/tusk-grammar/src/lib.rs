//! The grammar-to-parse-tree pipeline.
//!
//! A request carries one unified grammar or a lexer/parser pair, some source text, and a rule name. The
//! [`ParsePipeline`][pipeline::ParsePipeline] writes the grammars into a fresh [session][session::Session], runs the
//! grammar compiler there, loads the generated recognizers, and parses the source text starting at the requested
//! rule. Every stage can fail on its own, and each failure maps to a single response.
#![deny(warnings)]

pub mod artifact;
pub mod compiler;
pub mod executor;
pub mod layout;
pub mod name;
pub mod pipeline;
pub mod session;
