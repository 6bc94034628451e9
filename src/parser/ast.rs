//! Abstract Syntax Tree types for CHTL template declarations and usages

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// AST node with source location
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// Valid identifier (alphanumeric + underscore + hyphen, starts with letter/_)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(pub String);

impl Identifier {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Declaration kind - drives both body grammar and merge policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    Style,
    Element,
    Var,
}

impl std::fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateKind::Style => write!(f, "@Style"),
            TemplateKind::Element => write!(f, "@Element"),
            TemplateKind::Var => write!(f, "@Var"),
        }
    }
}

/// Whether a declaration came from a `[Template]` or `[Custom]` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionOrigin {
    Template,
    Custom,
}

/// How a reference ties into its surrounding definition or usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InheritanceKind {
    /// `@Style Name;` inside a body - inline splice at that position
    Composition,
    /// `inherit @Style Name;` - persistent ancestor relationship
    Explicit,
}

/// Root AST node - a complete CHTL compilation unit
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub items: Vec<Spanned<Item>>,
}

/// Top-level item in a document
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    /// `[Template]` or `[Custom]` declaration
    Definition(Definition),
    /// A concrete element such as `div { ... }`
    Element(ElementNode),
    /// A template/custom usage such as `@Element Card;`
    Use(Reference),
}

/// A registered template or custom definition
///
/// Created once by the declaration parser and owned by a registry for the
/// rest of the compilation; never mutated after registration. Inheritance is
/// resolved lazily at every expansion, not baked in here.
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub origin: DefinitionOrigin,
    pub kind: TemplateKind,
    pub name: Spanned<Identifier>,
    pub content: DefinitionContent,
    /// Explicit `inherit` ancestors, in declaration order
    pub inheritance: Vec<Spanned<Reference>>,
    /// Property names declared without a value (`[Custom] @Style` only)
    pub valueless: Vec<Spanned<Identifier>>,
    /// Specialization operations baked into a `[Custom]` declaration body
    pub specializations: Vec<Spanned<SpecializationOp>>,
}

impl Definition {
    /// Registry key for this definition
    pub fn key(&self) -> (TemplateKind, String) {
        (self.kind, self.name.node.0.clone())
    }
}

/// Kind-specific definition body
#[derive(Debug, Clone, PartialEq)]
pub enum DefinitionContent {
    Style(Vec<Spanned<StyleEntry>>),
    Element(Vec<Spanned<Node>>),
    /// Ordered name -> value pairs; insertion order is preserved
    Var(Vec<(Spanned<Identifier>, StyleValue)>),
}

/// One entry of a style body
#[derive(Debug, Clone, PartialEq)]
pub enum StyleEntry {
    /// `property: value;`
    Property {
        name: Spanned<Identifier>,
        value: StyleValue,
    },
    /// `property,` or `property;` without a value - filled by the consumer
    Valueless(Spanned<Identifier>),
    /// Composition use spliced inline: `@Style Name;`
    Use(Reference),
}

/// A property value - opaque CSS text or a variable-group lookup
#[derive(Debug, Clone, PartialEq)]
pub enum StyleValue {
    /// Raw value text, e.g. `black`, `16px`, `rgb(255, 192, 203)`
    Literal(String),
    /// `Group(name)` or `Group(name = "value")` resolved at expansion time
    VarRef {
        group: Spanned<Identifier>,
        name: Spanned<Identifier>,
        /// `VariableOverride`: replaces the looked-up value for this usage only
        override_value: Option<String>,
    },
}

/// A node of an element body
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(ElementNode),
    Text(String),
    /// Template/custom usage statement
    Use(Reference),
}

/// Concrete element with an optional local style block and children
#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    pub tag: Spanned<Identifier>,
    pub style: Vec<Spanned<StyleEntry>>,
    pub children: Vec<Spanned<Node>>,
}

/// A usage site pointing at a registered definition
///
/// Transient: built by the usage parser and consumed immediately by the
/// expander.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub kind: TemplateKind,
    pub name: Spanned<Identifier>,
    pub inheritance: InheritanceKind,
    pub specializations: Vec<Spanned<SpecializationOp>>,
}

impl Reference {
    /// A plain composition reference with no specializations
    pub fn composition(kind: TemplateKind, name: Spanned<Identifier>) -> Self {
        Self {
            kind,
            name,
            inheritance: InheritanceKind::Composition,
            specializations: Vec::new(),
        }
    }
}

/// A targeted edit applied to a clone of expanded content
#[derive(Debug, Clone, PartialEq)]
pub enum SpecializationOp {
    /// `delete color;` in a style context - removes the first match
    DeleteProperty { name: Spanned<Identifier> },
    /// `delete span;` / `delete div[1];` in an element context
    DeleteElement { selector: Selector },
    /// `delete @Style Name;` - removes one ancestor's contribution
    DeleteInheritance {
        kind: TemplateKind,
        name: Spanned<Identifier>,
    },
    /// `insert after div[0] { ... }` / `insert at top { ... }`
    InsertElement {
        position: InsertPosition,
        /// Anchor; absent for `at top` / `at bottom`
        selector: Option<Selector>,
        content: Vec<Spanned<Node>>,
    },
    /// `div[1] { ... }` - narrow to the Nth matching sibling, then apply ops
    IndexAccess {
        selector: Selector,
        ops: Vec<Spanned<SpecializationOp>>,
    },
    /// `property: value;` in a usage body - valueless fill or override
    SetProperty {
        name: Spanned<Identifier>,
        value: StyleValue,
    },
}

/// Tag selector with an optional zero-based index
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    pub tag: Spanned<Identifier>,
    pub index: Option<usize>,
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.index {
            Some(i) => write!(f, "{}[{}]", self.tag.node, i),
            None => write!(f, "{}", self.tag.node),
        }
    }
}

/// Where an inserted fragment lands relative to its anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    Before,
    After,
    Replace,
    AtTop,
    AtBottom,
}
