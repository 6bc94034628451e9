//! Parser for CHTL template and custom declarations

pub mod ast;
mod grammar;
pub mod lexer;

pub use ast::*;
pub use grammar::{parse, parse_recovering, parse_usage};
