//! Registries for template and custom definitions

use std::collections::HashMap;

use thiserror::Error;

use crate::config::CompilerOptions;
use crate::error::Diagnostic;
use crate::parser::ast::{Definition, DefinitionOrigin, Document, Item, Reference, TemplateKind};

/// Errors that can occur during expansion
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpandError {
    /// A `(kind, name)` key was registered twice
    #[error("duplicate definition of {kind} {name}")]
    DuplicateDefinition { kind: TemplateKind, name: String },

    /// A usage names a definition that does not exist
    #[error("undefined reference: {kind} {name}")]
    UndefinedReference { kind: TemplateKind, name: String },

    /// A usage names an existing definition under the wrong kind
    #[error("'{name}' is registered as {actual}, referenced as {expected}")]
    KindMismatch {
        name: String,
        expected: TemplateKind,
        actual: TemplateKind,
    },

    /// Inheritance resolution revisited a definition already on the stack
    #[error("circular inheritance: {chain}")]
    CircularInheritance { chain: String },

    /// Inheritance chain exceeded the configured depth limit
    #[error("inheritance depth limit exceeded ({limit})")]
    DepthLimitExceeded { limit: usize },

    /// An insert anchor or index-access target does not exist
    #[error("specialization target not found: {target}")]
    SpecializationTargetNotFound { target: String },

    /// An indexed selector points past the matching siblings
    #[error("index out of range: {selector} ({matches} matching)")]
    IndexOutOfRange { selector: String, matches: usize },
}

/// Insertion-once map from `(kind, name)` to definitions
///
/// One registry exists per declaration origin; `[Template]` and `[Custom]`
/// names never collide across origins.
#[derive(Debug, Default)]
pub struct Registry {
    definitions: HashMap<(TemplateKind, String), Definition>,
}

/// Registry for `[Template]` declarations
pub type TemplateRegistry = Registry;
/// Registry for `[Custom]` declarations
pub type CustomRegistry = Registry;

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition; returns false if the key is already taken.
    /// The first registration wins and the stored definition is unchanged.
    pub fn register(&mut self, def: Definition) -> bool {
        let key = def.key();
        if self.definitions.contains_key(&key) {
            return false;
        }
        self.definitions.insert(key, def);
        true
    }

    /// Get a definition by kind and name
    pub fn find(&self, kind: TemplateKind, name: &str) -> Option<&Definition> {
        self.definitions.get(&(kind, name.to_string()))
    }

    /// Check whether a reference points at a registered definition of the
    /// right kind
    pub fn validate_reference(&self, reference: &Reference) -> bool {
        self.find(reference.kind, reference.name.node.as_str())
            .is_some()
    }

    /// Check if a key exists
    pub fn contains(&self, kind: TemplateKind, name: &str) -> bool {
        self.find(kind, name).is_some()
    }

    /// Read-only iteration over registered keys, for external checkers
    pub fn names(&self) -> impl Iterator<Item = (TemplateKind, &str)> {
        self.definitions.keys().map(|(k, n)| (*k, n.as_str()))
    }

    /// Find a definition by name alone, for kind-mismatch diagnosis
    ///
    /// Kinds are probed in a fixed order so the reported kind is stable
    /// when one name is registered under several.
    pub fn find_by_name(&self, name: &str) -> Option<&Definition> {
        [TemplateKind::Style, TemplateKind::Element, TemplateKind::Var]
            .iter()
            .find_map(|kind| self.find(*kind, name))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Remove everything; test isolation
    pub fn clear(&mut self) {
        self.definitions.clear();
    }
}

/// All mutable state of one compilation pass
///
/// The registry pair, the options, and the accumulated diagnostics live here
/// rather than in any global; two contexts never observe each other.
#[derive(Debug, Default)]
pub struct CompilationContext {
    pub templates: TemplateRegistry,
    pub customs: CustomRegistry,
    pub options: CompilerOptions,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompilationContext {
    /// Create a context with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context with explicit options
    pub fn with_options(options: CompilerOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Register a definition into the registry matching its origin
    ///
    /// A duplicate key records a `DuplicateDefinition` diagnostic; the first
    /// definition stays retrievable unchanged.
    pub fn register(&mut self, def: Definition) {
        let kind = def.kind;
        let name = def.name.node.0.clone();
        let span = def.name.span.clone();
        let registry = match def.origin {
            DefinitionOrigin::Template => &mut self.templates,
            DefinitionOrigin::Custom => &mut self.customs,
        };
        if !registry.register(def) {
            self.diagnostics.push(Diagnostic::error(
                ExpandError::DuplicateDefinition { kind, name }.to_string(),
                Some(span),
            ));
        }
    }

    /// Register every declaration of a document, in order
    pub fn collect(&mut self, doc: &Document) {
        for item in &doc.items {
            if let Item::Definition(def) = &item.node {
                self.register(def.clone());
            }
        }
    }

    /// Look up a definition; the template registry shadows the custom one
    pub fn find(&self, kind: TemplateKind, name: &str) -> Option<&Definition> {
        self.templates
            .find(kind, name)
            .or_else(|| self.customs.find(kind, name))
    }

    /// Look up by name alone, for kind-mismatch diagnosis
    pub fn find_by_name(&self, name: &str) -> Option<&Definition> {
        self.templates
            .find_by_name(name)
            .or_else(|| self.customs.find_by_name(name))
    }

    /// True if any accumulated diagnostic is an error
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.is_error())
    }
}
