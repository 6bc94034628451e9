//! Usage expansion - turns references into concrete content
//!
//! Expansion looks the definition up, resolves its inheritance into a fresh
//! clone, then replays the usage's specialization operations against that
//! clone in declaration order. The registered definition is never touched,
//! so expanding the same reference twice gives equal, independent results.

use crate::error::Diagnostic;
use crate::parser::ast::{
    Definition, DefinitionContent, Document, InsertPosition, Item, Node, Reference, Selector,
    Spanned, SpecializationOp, StyleEntry, TemplateKind,
};

use super::registry::{CompilationContext, ExpandError};
use super::resolver::{
    self, delete_property, lookup, resolve_definition, resolve_nodes, resolve_value,
    ExpandedNode, ResolutionContext, ResolvedContent,
};

/// Expand one usage into concrete content
pub fn expand_reference(
    reference: &Reference,
    ctx: &CompilationContext,
    rctx: &mut ResolutionContext,
    diags: &mut Vec<Diagnostic>,
) -> Result<ResolvedContent, ExpandError> {
    let def = lookup(ctx, reference)?;
    let mut excluded: Vec<(TemplateKind, String)> = Vec::new();
    let mut content = resolve_definition(def, ctx, rctx, &excluded, diags)?;

    for (i, op) in reference.specializations.iter().enumerate() {
        if let SpecializationOp::DeleteInheritance { kind, name } = &op.node {
            if !has_ancestor(def, *kind, name.node.as_str()) {
                if ctx.options.warn_missing_delete_target {
                    diags.push(Diagnostic::warning(
                        format!("{} {} is not an ancestor here", kind, name.node),
                        Some(op.span.clone()),
                    ));
                }
                continue;
            }
            // Re-merge without the ancestor, then quietly replay what came
            // before this operation.
            excluded.push((*kind, name.node.0.clone()));
            content = resolve_definition(def, ctx, rctx, &excluded, diags)?;
            for prior in &reference.specializations[..i] {
                if matches!(prior.node, SpecializationOp::DeleteInheritance { .. }) {
                    continue;
                }
                soften(apply_op(&mut content, prior, ctx, rctx, diags, true))?;
            }
        } else {
            apply_op(&mut content, op, ctx, rctx, diags, false)?;
        }
    }
    Ok(content)
}

/// Drive a whole document through registration and expansion, in order
///
/// Declarations register as they are encountered; usages see exactly the
/// declarations above them. Expansion failures become diagnostics and the
/// pass moves on to the next item.
pub fn expand_document(doc: &Document, ctx: &mut CompilationContext) -> Vec<ExpandedNode> {
    let mut out = Vec::new();
    let mut rctx = ResolutionContext::new(ctx.options.max_inheritance_depth);

    for item in &doc.items {
        match &item.node {
            Item::Definition(def) => ctx.register(def.clone()),
            Item::Use(reference) => {
                let mut local = Vec::new();
                let result = expand_reference(reference, ctx, &mut rctx, &mut local);
                ctx.diagnostics.append(&mut local);
                match result {
                    Ok(ResolvedContent::Element(nodes)) => out.extend(nodes),
                    Ok(_) => ctx.diagnostics.push(Diagnostic::error(
                        format!(
                            "only @Element usages may appear at the top level, not {}",
                            reference.kind
                        ),
                        Some(item.span.clone()),
                    )),
                    Err(err) => ctx
                        .diagnostics
                        .push(Diagnostic::error(err.to_string(), Some(item.span.clone()))),
                }
            }
            Item::Element(el) => {
                let mut local = Vec::new();
                let result = resolver::resolve_element(el, ctx, &mut rctx, &mut local);
                ctx.diagnostics.append(&mut local);
                match result {
                    Ok(expanded) => out.push(ExpandedNode::Element(expanded)),
                    Err(err) => ctx
                        .diagnostics
                        .push(Diagnostic::error(err.to_string(), Some(item.span.clone()))),
                }
            }
        }
    }
    out
}

/// Quiet replay skips operations whose targets no longer exist
fn soften(result: Result<(), ExpandError>) -> Result<(), ExpandError> {
    match result {
        Err(ExpandError::SpecializationTargetNotFound { .. })
        | Err(ExpandError::IndexOutOfRange { .. }) => Ok(()),
        other => other,
    }
}

/// True if the definition inherits from `(kind, name)`, explicitly or by a
/// top-level composition use
fn has_ancestor(def: &Definition, kind: TemplateKind, name: &str) -> bool {
    let explicit = def
        .inheritance
        .iter()
        .any(|a| a.node.kind == kind && a.node.name.node.as_str() == name);
    if explicit {
        return true;
    }
    match &def.content {
        DefinitionContent::Style(entries) => entries.iter().any(|e| {
            matches!(&e.node, StyleEntry::Use(r) if r.kind == kind && r.name.node.as_str() == name)
        }),
        DefinitionContent::Element(nodes) => nodes.iter().any(|n| {
            matches!(&n.node, Node::Use(r) if r.kind == kind && r.name.node.as_str() == name)
        }),
        DefinitionContent::Var(_) => false,
    }
}

/// Apply one specialization to resolved content
fn apply_op(
    content: &mut ResolvedContent,
    op: &Spanned<SpecializationOp>,
    ctx: &CompilationContext,
    rctx: &mut ResolutionContext,
    diags: &mut Vec<Diagnostic>,
    quiet: bool,
) -> Result<(), ExpandError> {
    match content {
        ResolvedContent::Style(props) => match &op.node {
            SpecializationOp::DeleteProperty { name } => {
                delete_property(props, name.node.as_str(), &op.span, ctx, diags, quiet);
                Ok(())
            }
            SpecializationOp::SetProperty { name, value } => {
                let value = resolve_value(value, ctx, rctx, diags)?;
                resolver::set_property(props, name.node.as_str(), Some(value));
                Ok(())
            }
            other => {
                if !quiet {
                    diags.push(Diagnostic::warning(
                        format!("operation has no effect on a style usage: {:?}", other),
                        Some(op.span.clone()),
                    ));
                }
                Ok(())
            }
        },
        ResolvedContent::Element(nodes) => apply_node_op(nodes, op, ctx, rctx, diags, quiet),
        ResolvedContent::Var(_) => {
            if !quiet {
                diags.push(Diagnostic::warning(
                    "specializations are not supported on @Var usages",
                    Some(op.span.clone()),
                ));
            }
            Ok(())
        }
    }
}

/// Apply one specialization to a node list
pub(crate) fn apply_node_op(
    nodes: &mut Vec<ExpandedNode>,
    op: &Spanned<SpecializationOp>,
    ctx: &CompilationContext,
    rctx: &mut ResolutionContext,
    diags: &mut Vec<Diagnostic>,
    quiet: bool,
) -> Result<(), ExpandError> {
    match &op.node {
        SpecializationOp::DeleteElement { selector } => {
            if selector.index.is_some() {
                // An indexed delete names a specific sibling; a miss is hard
                let pos = find_target(nodes, selector, ctx)?;
                nodes.remove(pos);
            } else {
                let tag = selector.tag.node.as_str();
                let before = nodes.len();
                nodes.retain(|n| !node_matches(n, tag));
                if nodes.len() == before && !quiet && ctx.options.warn_missing_delete_target {
                    diags.push(Diagnostic::warning(
                        format!("delete target '{}' matched nothing", selector),
                        Some(op.span.clone()),
                    ));
                }
            }
            Ok(())
        }
        SpecializationOp::InsertElement {
            position,
            selector,
            content,
        } => {
            let expanded = resolve_nodes(content, ctx, rctx, &[], diags)?;
            match position {
                InsertPosition::AtTop => {
                    nodes.splice(0..0, expanded);
                }
                InsertPosition::AtBottom => {
                    nodes.extend(expanded);
                }
                InsertPosition::Before | InsertPosition::After | InsertPosition::Replace => {
                    let selector =
                        selector
                            .as_ref()
                            .ok_or_else(|| ExpandError::SpecializationTargetNotFound {
                                target: "<missing anchor>".to_string(),
                            })?;
                    let pos = find_target(nodes, selector, ctx)?;
                    match position {
                        InsertPosition::Before => {
                            nodes.splice(pos..pos, expanded);
                        }
                        InsertPosition::After => {
                            nodes.splice(pos + 1..pos + 1, expanded);
                        }
                        InsertPosition::Replace => {
                            nodes.splice(pos..pos + 1, expanded);
                        }
                        _ => unreachable!(),
                    }
                }
            }
            Ok(())
        }
        SpecializationOp::IndexAccess { selector, ops } => {
            let pos = find_target(nodes, selector, ctx)?;
            match &mut nodes[pos] {
                ExpandedNode::Element(el) => {
                    for nested in ops {
                        apply_element_op(el, nested, ctx, rctx, diags, quiet)?;
                    }
                    Ok(())
                }
                ExpandedNode::Text(_) => Err(ExpandError::SpecializationTargetNotFound {
                    target: selector.to_string(),
                }),
            }
        }
        other => {
            if !quiet {
                diags.push(Diagnostic::warning(
                    format!("operation has no effect on an element usage: {:?}", other),
                    Some(op.span.clone()),
                ));
            }
            Ok(())
        }
    }
}

/// Apply one specialization inside an indexed element: style operations hit
/// its style, element operations hit its children
fn apply_element_op(
    el: &mut super::resolver::ExpandedElement,
    op: &Spanned<SpecializationOp>,
    ctx: &CompilationContext,
    rctx: &mut ResolutionContext,
    diags: &mut Vec<Diagnostic>,
    quiet: bool,
) -> Result<(), ExpandError> {
    match &op.node {
        SpecializationOp::DeleteProperty { name } => {
            delete_property(&mut el.style, name.node.as_str(), &op.span, ctx, diags, quiet);
            Ok(())
        }
        SpecializationOp::SetProperty { name, value } => {
            let value = resolve_value(value, ctx, rctx, diags)?;
            resolver::set_property(&mut el.style, name.node.as_str(), Some(value));
            Ok(())
        }
        SpecializationOp::DeleteElement { .. }
        | SpecializationOp::InsertElement { .. }
        | SpecializationOp::IndexAccess { .. } => {
            apply_node_op(&mut el.children, op, ctx, rctx, diags, quiet)
        }
        SpecializationOp::DeleteInheritance { .. } => {
            if !quiet {
                diags.push(Diagnostic::warning(
                    "inheritance deletion has no effect inside an indexed element",
                    Some(op.span.clone()),
                ));
            }
            Ok(())
        }
    }
}

/// True if a node matches a selector tag; `text` matches text nodes
fn node_matches(node: &ExpandedNode, tag: &str) -> bool {
    match node {
        ExpandedNode::Element(el) => el.tag == tag,
        ExpandedNode::Text(_) => tag == "text",
    }
}

/// Find the position of a selector's target among the given siblings
///
/// Indexed selectors count matching siblings only, zero-based after the
/// configured index base is subtracted.
fn find_target(
    nodes: &[ExpandedNode],
    selector: &Selector,
    ctx: &CompilationContext,
) -> Result<usize, ExpandError> {
    let tag = selector.tag.node.as_str();
    let positions: Vec<usize> = nodes
        .iter()
        .enumerate()
        .filter(|(_, n)| node_matches(n, tag))
        .map(|(i, _)| i)
        .collect();

    match selector.index {
        Some(index) => {
            let out_of_range = || ExpandError::IndexOutOfRange {
                selector: selector.to_string(),
                matches: positions.len(),
            };
            let effective = index
                .checked_sub(ctx.options.index_base)
                .ok_or_else(out_of_range)?;
            positions.get(effective).copied().ok_or_else(out_of_range)
        }
        None => positions
            .first()
            .copied()
            .ok_or_else(|| ExpandError::SpecializationTargetNotFound {
                target: selector.to_string(),
            }),
    }
}
