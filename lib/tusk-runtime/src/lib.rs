//! A grammar interpreter.
//!
//! This crate recognizes input against grammars compiled by the ANTLR tool without running any generated code. It
//! reads the interpreter data the tool emits alongside the generated sources, deserializes the ATN inside it, and
//! simulates that network directly: a [`LexerInterpreter`] turns characters into tokens, and a [`ParserInterpreter`]
//! turns tokens into a [`ParseTree`].
//!
//! The pipeline-facing surface is the [`LexerFactory`], [`ParserFactory`], and [`Recognizer`] traits, which
//! [`LexerDefinition`] and [`ParserDefinition`] implement.
#![deny(warnings)]

pub mod atn;

pub mod interp;
pub use self::interp::{InterpDataError, InterpreterData};

mod lexer;
pub use self::lexer::{LexerDefinition, LexerInterpreter};

mod parser;
pub use self::parser::{ParserDefinition, ParserInterpreter};

mod recognizer;
pub use self::recognizer::{
    ConstructionError, DefinitionError, LexerFactory, ParserFactory, Recognizer, RuleExecutionError,
};

mod stream;
pub use self::stream::CommonTokenStream;

mod token;
pub use self::token::{SyntaxError, Token, TokenSource, Vocabulary};

mod tree;
pub use self::tree::{NodeId, ParseTree};
