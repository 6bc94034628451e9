//! Template and custom definition system
//!
//! This module provides the registries, the lazy inheritance resolver, and
//! the usage expander for `[Template]` and `[Custom]` declarations.
//!
//! # Example
//!
//! ```text
//! // Define a template
//! [Template] @Style DefaultText {
//!     color: black;
//!     font-size: 16px;
//! }
//!
//! // Use it, specialized
//! div {
//!     style {
//!         @Style DefaultText { delete font-size; }
//!     }
//! }
//! ```

mod expander;
mod registry;
mod resolver;

pub use expander::{expand_document, expand_reference};
pub use registry::{CompilationContext, CustomRegistry, ExpandError, Registry, TemplateRegistry};
pub use resolver::{
    resolve_definition, ExpandedElement, ExpandedNode, ResolutionContext, ResolvedContent,
    StyleProperty,
};
