//! CHTL template expansion engine
//!
//! This library parses `[Template]` and `[Custom]` declarations of the CHTL
//! templating language, tracks them in per-origin registries, resolves
//! multi-level inheritance lazily, and expands every usage site into
//! concrete elements, text, and style properties.
//!
//! # Example
//!
//! ```rust
//! use chtl::expand;
//!
//! let nodes = expand(r#"
//!     [Template] @Style DefaultText { color: black; }
//!     [Template] @Element Card {
//!         div { style { @Style DefaultText; } }
//!     }
//!     @Element Card;
//! "#).unwrap();
//!
//! assert_eq!(nodes.len(), 1);
//! ```

pub mod config;
pub mod error;
pub mod parser;
pub mod template;

pub use config::{CompilerOptions, ConfigError};
pub use error::{Diagnostic, ParseError, Severity};
pub use parser::{parse, parse_recovering, parse_usage, Document};
pub use template::{
    expand_document, expand_reference, CompilationContext, ExpandError, ExpandedElement,
    ExpandedNode, ResolutionContext, ResolvedContent, StyleProperty,
};

use thiserror::Error;

/// Errors that can occur during the expansion pipeline
#[derive(Debug, Error)]
pub enum CompileError {
    /// Errors during parsing
    #[error("parse errors: {}", format_parse_errors(.0))]
    Parse(Vec<ParseError>),

    /// Errors accumulated during expansion
    #[error("expansion errors: {}", format_diagnostics(.0))]
    Expand(Vec<Diagnostic>),
}

impl From<Vec<ParseError>> for CompileError {
    fn from(errors: Vec<ParseError>) -> Self {
        CompileError::Parse(errors)
    }
}

fn format_parse_errors(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Expand CHTL source with default options
///
/// This is the main entry point for the library. It parses the source,
/// registers every declaration, and expands every usage in document order.
pub fn expand(source: &str) -> Result<Vec<ExpandedNode>, CompileError> {
    let mut ctx = CompilationContext::new();
    expand_with_context(source, &mut ctx)
}

/// Expand CHTL source into an existing compilation context
///
/// The context keeps its registries and diagnostics across calls, so hosts
/// can pre-register definitions (an import subsystem would) and inspect
/// warnings afterwards. A malformed item aborts only itself: its syntax
/// error lands on the context as a diagnostic and the pass continues over
/// the surviving items, so good declarations still register and expand.
/// Returns `CompileError::Expand` if any error-severity diagnostic was
/// recorded during this call; diagnostics left over from earlier calls on
/// the same context do not fail a clean pass.
pub fn expand_with_context(
    source: &str,
    ctx: &mut CompilationContext,
) -> Result<Vec<ExpandedNode>, CompileError> {
    let already_recorded = ctx.diagnostics.len();

    let (doc, parse_errors) = parse_recovering(source);
    for err in &parse_errors {
        ctx.diagnostics.push(Diagnostic::error(
            format!("syntax error: {}", err.message()),
            Some(err.span()),
        ));
    }
    let doc = match doc {
        Some(doc) => doc,
        None => return Err(CompileError::Parse(parse_errors)),
    };

    let nodes = expand_document(&doc, ctx);

    let pass_errors: Vec<Diagnostic> = ctx.diagnostics[already_recorded..]
        .iter()
        .filter(|d| d.is_error())
        .cloned()
        .collect();
    if pass_errors.is_empty() {
        Ok(nodes)
    } else {
        Err(CompileError::Expand(pass_errors))
    }
}
