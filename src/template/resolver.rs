//! Inheritance resolution - merges a definition with its ancestors
//!
//! Resolution is lazy: nothing is merged at registration time. Every usage
//! walks the inheritance graph of its definition from scratch, so a
//! definition registered after an earlier expansion never changes what that
//! expansion produced.

use crate::error::Diagnostic;
use crate::parser::ast::{
    Definition, DefinitionContent, ElementNode, Node, Reference, Spanned, SpecializationOp,
    StyleEntry, StyleValue, TemplateKind,
};

use super::registry::{CompilationContext, ExpandError};

/// One concrete style property; `value` stays `None` for an unfilled
/// valueless property
#[derive(Debug, Clone, PartialEq)]
pub struct StyleProperty {
    pub name: String,
    pub value: Option<String>,
}

/// A fully expanded node - no usages, no variable references left
#[derive(Debug, Clone, PartialEq)]
pub enum ExpandedNode {
    Element(ExpandedElement),
    Text(String),
}

/// A fully expanded element
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedElement {
    pub tag: String,
    pub style: Vec<StyleProperty>,
    pub children: Vec<ExpandedNode>,
}

/// The merged, concrete content of one resolved definition
///
/// Always an independent clone; applying specializations to it never touches
/// the registered definition.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedContent {
    Style(Vec<StyleProperty>),
    Element(Vec<ExpandedNode>),
    Var(Vec<(String, String)>),
}

impl ResolvedContent {
    pub fn kind(&self) -> TemplateKind {
        match self {
            ResolvedContent::Style(_) => TemplateKind::Style,
            ResolvedContent::Element(_) => TemplateKind::Element,
            ResolvedContent::Var(_) => TemplateKind::Var,
        }
    }
}

/// Context for one resolution walk
///
/// Tracks the chain of definitions currently being resolved so that a
/// revisit fails with `CircularInheritance` instead of recursing forever.
#[derive(Debug, Clone)]
pub struct ResolutionContext {
    resolving: Vec<(TemplateKind, String)>,
    max_depth: usize,
}

impl Default for ResolutionContext {
    fn default() -> Self {
        Self::new(crate::config::CompilerOptions::default().max_inheritance_depth)
    }
}

impl ResolutionContext {
    /// Create a context with the given depth limit
    pub fn new(max_depth: usize) -> Self {
        Self {
            resolving: Vec::new(),
            max_depth,
        }
    }

    /// Check if a definition is currently on the resolution stack
    pub fn is_resolving(&self, kind: TemplateKind, name: &str) -> bool {
        self.resolving.iter().any(|(k, n)| *k == kind && n == name)
    }

    fn enter(&mut self, kind: TemplateKind, name: &str) -> Result<(), ExpandError> {
        if self.is_resolving(kind, name) {
            let chain = self
                .resolving
                .iter()
                .map(|(k, n)| format!("{} {}", k, n))
                .chain(std::iter::once(format!("{} {}", kind, name)))
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(ExpandError::CircularInheritance { chain });
        }
        if self.resolving.len() >= self.max_depth {
            return Err(ExpandError::DepthLimitExceeded {
                limit: self.max_depth,
            });
        }
        self.resolving.push((kind, name.to_string()));
        Ok(())
    }

    fn leave(&mut self) {
        self.resolving.pop();
    }
}

/// Look up the definition a reference points at
///
/// The template registry shadows the custom one; a name found only under a
/// different kind is a `KindMismatch`.
pub(crate) fn lookup<'a>(
    ctx: &'a CompilationContext,
    reference: &Reference,
) -> Result<&'a Definition, ExpandError> {
    let name = reference.name.node.as_str();
    if let Some(def) = ctx.find(reference.kind, name) {
        return Ok(def);
    }
    if let Some(other) = ctx.find_by_name(name) {
        return Err(ExpandError::KindMismatch {
            name: name.to_string(),
            expected: reference.kind,
            actual: other.kind,
        });
    }
    Err(ExpandError::UndefinedReference {
        kind: reference.kind,
        name: name.to_string(),
    })
}

/// Merge a definition with its ancestors into concrete content
///
/// `excluded` keys are skipped when merging explicit ancestors and top-level
/// composition uses; `DeleteInheritance` re-merges through it.
pub fn resolve_definition(
    def: &Definition,
    ctx: &CompilationContext,
    rctx: &mut ResolutionContext,
    excluded: &[(TemplateKind, String)],
    diags: &mut Vec<Diagnostic>,
) -> Result<ResolvedContent, ExpandError> {
    rctx.enter(def.kind, def.name.node.as_str())?;
    let result = resolve_body(def, ctx, rctx, excluded, diags);
    rctx.leave();
    result
}

fn resolve_body(
    def: &Definition,
    ctx: &CompilationContext,
    rctx: &mut ResolutionContext,
    excluded: &[(TemplateKind, String)],
    diags: &mut Vec<Diagnostic>,
) -> Result<ResolvedContent, ExpandError> {
    // Baked `delete @Kind Name;` operations exclude their ancestor up-front
    let mut excluded = excluded.to_vec();
    for op in &def.specializations {
        if let SpecializationOp::DeleteInheritance { kind, name } = &op.node {
            excluded.push((*kind, name.node.0.clone()));
        }
    }

    match &def.content {
        DefinitionContent::Style(entries) => {
            let mut props: Vec<StyleProperty> = Vec::new();
            for ancestor in resolved_ancestors(def, ctx, rctx, &excluded, diags)? {
                match ancestor {
                    ResolvedContent::Style(incoming) => merge_style(&mut props, incoming),
                    other => {
                        return Err(ExpandError::KindMismatch {
                            name: def.name.node.0.clone(),
                            expected: TemplateKind::Style,
                            actual: other.kind(),
                        })
                    }
                }
            }
            // Child entries win over anything inherited
            let own = resolve_style_entries(entries, ctx, rctx, &excluded, diags)?;
            merge_style(&mut props, own);

            for op in &def.specializations {
                if let SpecializationOp::DeleteProperty { name } = &op.node {
                    delete_property(&mut props, name.node.as_str(), &op.span, ctx, diags, false);
                }
            }
            Ok(ResolvedContent::Style(props))
        }
        DefinitionContent::Element(nodes) => {
            // Ancestor node sequences come first, in declaration order
            let mut out: Vec<ExpandedNode> = Vec::new();
            for ancestor in resolved_ancestors(def, ctx, rctx, &excluded, diags)? {
                match ancestor {
                    ResolvedContent::Element(incoming) => out.extend(incoming),
                    other => {
                        return Err(ExpandError::KindMismatch {
                            name: def.name.node.0.clone(),
                            expected: TemplateKind::Element,
                            actual: other.kind(),
                        })
                    }
                }
            }
            out.extend(resolve_nodes(nodes, ctx, rctx, &excluded, diags)?);

            for op in &def.specializations {
                if matches!(op.node, SpecializationOp::DeleteInheritance { .. }) {
                    continue;
                }
                super::expander::apply_node_op(&mut out, op, ctx, rctx, diags, false)?;
            }
            Ok(ResolvedContent::Element(out))
        }
        DefinitionContent::Var(pairs) => {
            let mut vars: Vec<(String, String)> = Vec::new();
            for ancestor in resolved_ancestors(def, ctx, rctx, &excluded, diags)? {
                match ancestor {
                    ResolvedContent::Var(incoming) => merge_vars(&mut vars, incoming),
                    other => {
                        return Err(ExpandError::KindMismatch {
                            name: def.name.node.0.clone(),
                            expected: TemplateKind::Var,
                            actual: other.kind(),
                        })
                    }
                }
            }
            for (name, value) in pairs {
                let value = resolve_value(value, ctx, rctx, diags)?;
                set_var(&mut vars, name.node.as_str(), value);
            }
            Ok(ResolvedContent::Var(vars))
        }
    }
}

/// Resolve the explicit ancestors of a definition, later ancestors last so
/// that the merge gives them precedence
fn resolved_ancestors(
    def: &Definition,
    ctx: &CompilationContext,
    rctx: &mut ResolutionContext,
    excluded: &[(TemplateKind, String)],
    diags: &mut Vec<Diagnostic>,
) -> Result<Vec<ResolvedContent>, ExpandError> {
    let mut resolved = Vec::new();
    for ancestor in &def.inheritance {
        let reference = &ancestor.node;
        if is_excluded(excluded, reference) {
            continue;
        }
        if reference.kind != def.kind {
            return Err(ExpandError::KindMismatch {
                name: reference.name.node.0.clone(),
                expected: def.kind,
                actual: reference.kind,
            });
        }
        let ancestor_def = lookup(ctx, reference)?;
        resolved.push(resolve_definition(ancestor_def, ctx, rctx, &[], diags)?);
    }
    Ok(resolved)
}

fn is_excluded(excluded: &[(TemplateKind, String)], reference: &Reference) -> bool {
    excluded
        .iter()
        .any(|(k, n)| *k == reference.kind && n == reference.name.node.as_str())
}

/// Resolve a list of style entries, splicing composition uses inline
pub(crate) fn resolve_style_entries(
    entries: &[Spanned<StyleEntry>],
    ctx: &CompilationContext,
    rctx: &mut ResolutionContext,
    excluded: &[(TemplateKind, String)],
    diags: &mut Vec<Diagnostic>,
) -> Result<Vec<StyleProperty>, ExpandError> {
    let mut props: Vec<StyleProperty> = Vec::new();
    for entry in entries {
        match &entry.node {
            StyleEntry::Property { name, value } => {
                let value = resolve_value(value, ctx, rctx, diags)?;
                set_property(&mut props, name.node.as_str(), Some(value));
            }
            StyleEntry::Valueless(name) => {
                // A valueless re-declaration never erases an inherited value
                if !props.iter().any(|p| p.name == name.node.as_str()) {
                    props.push(StyleProperty {
                        name: name.node.0.clone(),
                        value: None,
                    });
                }
            }
            StyleEntry::Use(reference) => {
                if is_excluded(excluded, reference) {
                    continue;
                }
                let content = super::expander::expand_reference(reference, ctx, rctx, diags)?;
                match content {
                    ResolvedContent::Style(spliced) => merge_style(&mut props, spliced),
                    other => {
                        return Err(ExpandError::KindMismatch {
                            name: reference.name.node.0.clone(),
                            expected: TemplateKind::Style,
                            actual: other.kind(),
                        })
                    }
                }
            }
        }
    }
    Ok(props)
}

/// Resolve a node list, splicing element uses inline at their position
pub(crate) fn resolve_nodes(
    nodes: &[Spanned<Node>],
    ctx: &CompilationContext,
    rctx: &mut ResolutionContext,
    excluded: &[(TemplateKind, String)],
    diags: &mut Vec<Diagnostic>,
) -> Result<Vec<ExpandedNode>, ExpandError> {
    let mut out = Vec::new();
    for node in nodes {
        match &node.node {
            Node::Text(text) => out.push(ExpandedNode::Text(text.clone())),
            Node::Element(el) => {
                out.push(ExpandedNode::Element(resolve_element(el, ctx, rctx, diags)?))
            }
            Node::Use(reference) => {
                if is_excluded(excluded, reference) {
                    continue;
                }
                let content = super::expander::expand_reference(reference, ctx, rctx, diags)?;
                match content {
                    ResolvedContent::Element(spliced) => out.extend(spliced),
                    other => {
                        return Err(ExpandError::KindMismatch {
                            name: reference.name.node.0.clone(),
                            expected: TemplateKind::Element,
                            actual: other.kind(),
                        })
                    }
                }
            }
        }
    }
    Ok(out)
}

/// Resolve one concrete element and its subtree
pub(crate) fn resolve_element(
    el: &ElementNode,
    ctx: &CompilationContext,
    rctx: &mut ResolutionContext,
    diags: &mut Vec<Diagnostic>,
) -> Result<ExpandedElement, ExpandError> {
    Ok(ExpandedElement {
        tag: el.tag.node.0.clone(),
        style: resolve_style_entries(&el.style, ctx, rctx, &[], diags)?,
        children: resolve_nodes(&el.children, ctx, rctx, &[], diags)?,
    })
}

/// Resolve a property value to concrete text
///
/// `Group(name)` looks the variable up in the registered `@Var` group; an
/// unregistered group name passes through as literal CSS function text so
/// that `var(--x)` and friends survive untouched.
pub(crate) fn resolve_value(
    value: &StyleValue,
    ctx: &CompilationContext,
    rctx: &mut ResolutionContext,
    diags: &mut Vec<Diagnostic>,
) -> Result<String, ExpandError> {
    match value {
        StyleValue::Literal(text) => Ok(text.clone()),
        StyleValue::VarRef {
            group,
            name,
            override_value,
        } => {
            // Override wins without touching the definition
            if let Some(v) = override_value {
                return Ok(v.clone());
            }
            let group_def = match ctx.find(TemplateKind::Var, group.node.as_str()) {
                Some(def) => def,
                None => return Ok(format!("{}({})", group.node, name.node)),
            };
            let resolved = resolve_definition(group_def, ctx, rctx, &[], diags)?;
            match resolved {
                ResolvedContent::Var(vars) => vars
                    .iter()
                    .find(|(n, _)| n == name.node.as_str())
                    .map(|(_, v)| v.clone())
                    .ok_or_else(|| ExpandError::UndefinedReference {
                        kind: TemplateKind::Var,
                        name: format!("{}({})", group.node, name.node),
                    }),
                other => Err(ExpandError::KindMismatch {
                    name: group.node.0.clone(),
                    expected: TemplateKind::Var,
                    actual: other.kind(),
                }),
            }
        }
    }
}

/// Set or override one property, keeping the first occurrence's position.
/// A `None` value never overwrites an existing entry.
pub(crate) fn set_property(props: &mut Vec<StyleProperty>, name: &str, value: Option<String>) {
    if let Some(existing) = props.iter_mut().find(|p| p.name == name) {
        if value.is_some() {
            existing.value = value;
        }
    } else {
        props.push(StyleProperty {
            name: name.to_string(),
            value,
        });
    }
}

/// Merge style properties left-to-right; incoming entries win ties
pub(crate) fn merge_style(base: &mut Vec<StyleProperty>, incoming: Vec<StyleProperty>) {
    for prop in incoming {
        set_property(base, &prop.name, prop.value);
    }
}

/// Remove the first property with the given name; misses warn when the
/// options say so and the replay is not quiet
pub(crate) fn delete_property(
    props: &mut Vec<StyleProperty>,
    name: &str,
    span: &crate::error::Span,
    ctx: &CompilationContext,
    diags: &mut Vec<Diagnostic>,
    quiet: bool,
) {
    if let Some(pos) = props.iter().position(|p| p.name == name) {
        props.remove(pos);
    } else if !quiet && ctx.options.warn_missing_delete_target {
        diags.push(Diagnostic::warning(
            format!("delete target '{}' not found", name),
            Some(span.clone()),
        ));
    }
}

fn set_var(vars: &mut Vec<(String, String)>, name: &str, value: String) {
    if let Some(existing) = vars.iter_mut().find(|(n, _)| n == name) {
        existing.1 = value;
    } else {
        vars.push((name.to_string(), value));
    }
}

/// Merge variable pairs left-to-right; incoming entries win ties
fn merge_vars(base: &mut Vec<(String, String)>, incoming: Vec<(String, String)>) {
    for (name, value) in incoming {
        set_var(base, &name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_from(source: &str) -> CompilationContext {
        let doc = crate::parser::parse(source).expect("Should parse");
        let mut ctx = CompilationContext::new();
        ctx.collect(&doc);
        ctx
    }

    fn resolve(ctx: &CompilationContext, kind: TemplateKind, name: &str) -> ResolvedContent {
        let def = ctx.find(kind, name).expect("Definition should exist");
        let mut rctx = ResolutionContext::default();
        let mut diags = Vec::new();
        resolve_definition(def, ctx, &mut rctx, &[], &mut diags).expect("Should resolve")
    }

    fn style_props(content: ResolvedContent) -> Vec<StyleProperty> {
        match content {
            ResolvedContent::Style(props) => props,
            other => panic!("Expected style content, got {:?}", other),
        }
    }

    #[test]
    fn test_child_wins_over_ancestor() {
        let ctx = context_from(
            r#"
            [Template] @Style Base { color: black; font-size: 16px; }
            [Custom] @Style Child { color: blue; inherit @Style Base; }
            "#,
        );
        let props = style_props(resolve(&ctx, TemplateKind::Style, "Child"));
        assert_eq!(props.len(), 2);
        // Overriding keeps the first occurrence's position
        assert_eq!(props[0].name, "color");
        assert_eq!(props[0].value.as_deref(), Some("blue"));
        assert_eq!(props[1].name, "font-size");
    }

    #[test]
    fn test_later_ancestor_wins() {
        let ctx = context_from(
            r#"
            [Template] @Style A { x: 1px; }
            [Template] @Style B { x: 2px; }
            [Custom] @Style C { inherit @Style A; inherit @Style B; }
            "#,
        );
        let props = style_props(resolve(&ctx, TemplateKind::Style, "C"));
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].value.as_deref(), Some("2px"));
    }

    #[test]
    fn test_multi_level_inheritance() {
        let ctx = context_from(
            r#"
            [Template] @Style A { a: 1px; }
            [Custom] @Style B { b: 2px; inherit @Style A; }
            [Custom] @Style C { c: 3px; inherit @Style B; }
            "#,
        );
        let props = style_props(resolve(&ctx, TemplateKind::Style, "C"));
        let names: Vec<&str> = props.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_element_ancestors_prepended() {
        let ctx = context_from(
            r#"
            [Template] @Element Base { span { } }
            [Custom] @Element Panel { div { } inherit @Element Base; }
            "#,
        );
        let nodes = match resolve(&ctx, TemplateKind::Element, "Panel") {
            ResolvedContent::Element(nodes) => nodes,
            other => panic!("Expected element content, got {:?}", other),
        };
        assert_eq!(nodes.len(), 2);
        match &nodes[0] {
            ExpandedNode::Element(el) => assert_eq!(el.tag, "span"),
            other => panic!("Expected element, got {:?}", other),
        }
        match &nodes[1] {
            ExpandedNode::Element(el) => assert_eq!(el.tag, "div"),
            other => panic!("Expected element, got {:?}", other),
        }
    }

    #[test]
    fn test_composition_splice_order() {
        let ctx = context_from(
            r#"
            [Template] @Element Mid { span { } }
            [Template] @Element Panel { div { } @Element Mid; div { } }
            "#,
        );
        let nodes = match resolve(&ctx, TemplateKind::Element, "Panel") {
            ResolvedContent::Element(nodes) => nodes,
            other => panic!("Expected element content, got {:?}", other),
        };
        let tags: Vec<&str> = nodes
            .iter()
            .map(|n| match n {
                ExpandedNode::Element(el) => el.tag.as_str(),
                ExpandedNode::Text(_) => "text",
            })
            .collect();
        assert_eq!(tags, vec!["div", "span", "div"]);
    }

    #[test]
    fn test_var_merge_child_wins() {
        let ctx = context_from(
            r#"
            [Template] @Var Base { primary: "blue"; spacing: 4px; }
            [Custom] @Var Theme { primary: "red"; inherit @Var Base; }
            "#,
        );
        let vars = match resolve(&ctx, TemplateKind::Var, "Theme") {
            ResolvedContent::Var(vars) => vars,
            other => panic!("Expected var content, got {:?}", other),
        };
        assert_eq!(vars.len(), 2);
        assert!(vars.contains(&("primary".to_string(), "red".to_string())));
        assert!(vars.contains(&("spacing".to_string(), "4px".to_string())));
    }

    #[test]
    fn test_cycle_detected() {
        let ctx = context_from(
            r#"
            [Custom] @Style A { inherit @Style B; }
            [Custom] @Style B { inherit @Style A; }
            "#,
        );
        let def = ctx.find(TemplateKind::Style, "A").unwrap();
        let mut rctx = ResolutionContext::default();
        let mut diags = Vec::new();
        let err = resolve_definition(def, &ctx, &mut rctx, &[], &mut diags).unwrap_err();
        match err {
            ExpandError::CircularInheritance { chain } => {
                assert!(chain.contains("@Style A"));
                assert!(chain.contains("@Style B"));
            }
            other => panic!("Expected circular inheritance, got {:?}", other),
        }
        // The stack unwinds cleanly; the context is reusable afterwards
        assert!(!rctx.is_resolving(TemplateKind::Style, "A"));
    }

    #[test]
    fn test_depth_limit() {
        let ctx = context_from(
            r#"
            [Template] @Style A { x: 1px; }
            [Custom] @Style B { inherit @Style A; }
            [Custom] @Style C { inherit @Style B; }
            "#,
        );
        let def = ctx.find(TemplateKind::Style, "C").unwrap();
        let mut rctx = ResolutionContext::new(2);
        let mut diags = Vec::new();
        let err = resolve_definition(def, &ctx, &mut rctx, &[], &mut diags).unwrap_err();
        assert!(matches!(err, ExpandError::DepthLimitExceeded { limit: 2 }));
    }

    #[test]
    fn test_undefined_ancestor() {
        let ctx = context_from("[Custom] @Style A { inherit @Style Missing; }");
        let def = ctx.find(TemplateKind::Style, "A").unwrap();
        let mut rctx = ResolutionContext::default();
        let mut diags = Vec::new();
        let err = resolve_definition(def, &ctx, &mut rctx, &[], &mut diags).unwrap_err();
        assert!(matches!(
            err,
            ExpandError::UndefinedReference {
                kind: TemplateKind::Style,
                ..
            }
        ));
    }

    #[test]
    fn test_var_reference_resolution() {
        let ctx = context_from(
            r#"
            [Template] @Var Theme { primary: "blue"; }
            [Template] @Style S { color: Theme(primary); border: Missing(arg); }
            "#,
        );
        let props = style_props(resolve(&ctx, TemplateKind::Style, "S"));
        assert_eq!(props[0].value.as_deref(), Some("blue"));
        // Unregistered groups pass through as literal function text
        assert_eq!(props[1].value.as_deref(), Some("Missing(arg)"));
    }

    #[test]
    fn test_unknown_variable_name_fails() {
        let ctx = context_from(
            r#"
            [Template] @Var Theme { primary: "blue"; }
            [Template] @Style S { color: Theme(missing); }
            "#,
        );
        let def = ctx.find(TemplateKind::Style, "S").unwrap();
        let mut rctx = ResolutionContext::default();
        let mut diags = Vec::new();
        let err = resolve_definition(def, &ctx, &mut rctx, &[], &mut diags).unwrap_err();
        match err {
            ExpandError::UndefinedReference { name, .. } => {
                assert_eq!(name, "Theme(missing)");
            }
            other => panic!("Expected undefined reference, got {:?}", other),
        }
    }

    #[test]
    fn test_valueless_kept_unfilled() {
        let ctx = context_from("[Custom] @Style S { color, font-size; line-height: 1.5; }");
        let props = style_props(resolve(&ctx, TemplateKind::Style, "S"));
        assert_eq!(props.len(), 3);
        assert!(props[0].value.is_none());
        assert!(props[1].value.is_none());
        assert_eq!(props[2].value.as_deref(), Some("1.5"));
    }

    #[test]
    fn test_valueless_never_erases_inherited_value() {
        let ctx = context_from(
            r#"
            [Template] @Style Base { color: black; }
            [Custom] @Style S { color; inherit @Style Base; }
            "#,
        );
        let props = style_props(resolve(&ctx, TemplateKind::Style, "S"));
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].value.as_deref(), Some("black"));
    }

    #[test]
    fn test_baked_delete_property() {
        let ctx = context_from(
            r#"
            [Template] @Style Base { color: black; font-size: 16px; }
            [Custom] @Style Slim { inherit @Style Base; delete color; }
            "#,
        );
        let props = style_props(resolve(&ctx, TemplateKind::Style, "Slim"));
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].name, "font-size");
    }

    #[test]
    fn test_baked_delete_inheritance() {
        let ctx = context_from(
            r#"
            [Template] @Style A { a: 1px; }
            [Template] @Style B { b: 2px; }
            [Custom] @Style C { inherit @Style A; inherit @Style B; delete @Style A; }
            "#,
        );
        let props = style_props(resolve(&ctx, TemplateKind::Style, "C"));
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].name, "b");
    }
}
