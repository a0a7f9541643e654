//! An interpreter for a small indentation-based, dynamically-typed
//! scripting language: integers, strings, booleans, `None`, and
//! single-inheritance classes with `__init__`/`__str__`/`__eq__`/
//! `__lt__`/`__add__` special methods.
//!
//! The pipeline is classic: [`lexer::Lexer`] turns text into a token
//! stream with synthetic indent/dedent/newline markers, [`parser::Parser`]
//! builds the AST, and [`evaluator::Evaluator`] walks it against a scope
//! tree, printing through a caller-provided sink.

pub mod ast;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod runner;
pub mod value;

pub use ast::{Expr, Program, Stmt};
pub use error::{ErrorKind, MinipyError, Span};
pub use evaluator::Evaluator;
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::Parser;
pub use value::{Class, ClassInstance, Closure, Method, Object, ObjectHolder};

pub use repl::start as start_repl;
pub use runner::{interpret, run};
