//! Parser implementation using chumsky

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::parser::ast::*;
use crate::parser::lexer::Token;

/// Helper enum for items of a style declaration body
#[derive(Debug, Clone)]
enum StyleItem {
    Entries(Vec<Spanned<StyleEntry>>),
    Inherit(Spanned<Reference>),
    Ops(Vec<Spanned<SpecializationOp>>),
}

/// Helper enum for items of an element declaration body
#[derive(Debug, Clone)]
enum ElemItem {
    Child(Spanned<Node>),
    Inherit(Spanned<Reference>),
    Ops(Vec<Spanned<SpecializationOp>>),
}

/// Helper enum for the parts of a concrete element body
#[derive(Debug, Clone)]
enum ElemPart {
    Style(Vec<Spanned<StyleEntry>>),
    Child(Spanned<Node>),
}

/// Helper enum for what follows a property name in a style body
#[derive(Debug, Clone)]
enum PropTail {
    Value(StyleValue),
    MoreValueless(Vec<Spanned<Identifier>>),
    Bare,
}

/// Helper enum for items of a var declaration body
#[derive(Debug, Clone)]
enum VarItem {
    Pair(Spanned<Identifier>, StyleValue),
    Inherit(Spanned<Reference>),
}

/// Parse CHTL source, recovering at top-level item boundaries
///
/// A malformed item aborts only itself: the parser skips to the next
/// top-level construct and the surviving items come back alongside the
/// errors, so the driver can keep the pass going.
pub fn parse_recovering(input: &str) -> (Option<Document>, Vec<crate::ParseError>) {
    let len = input.len();

    // Create a logos lexer and convert to token stream
    let token_iter = crate::parser::lexer::lex(input).map(|(tok, span)| (tok, span.into()));

    // Turn the token iterator into a stream that chumsky can use
    let token_stream = Stream::from_iter(token_iter)
        // Split (Token, SimpleSpan) into token and span parts
        .map((len..len).into(), |(t, s): (_, _)| (t, s));

    let (output, errors) = document_parser().parse(token_stream).into_output_errors();
    (output, errors.into_iter().map(|e| e.into()).collect())
}

/// Parse CHTL source code into an AST, rejecting any syntax error
pub fn parse(input: &str) -> Result<Document, Vec<crate::ParseError>> {
    match parse_recovering(input) {
        (Some(doc), errors) if errors.is_empty() => Ok(doc),
        (_, errors) => Err(errors),
    }
}

/// Parse a standalone usage statement into a `Reference`
///
/// Entry point for the import subsystem and for hosts that hold references
/// outside a full document.
pub fn parse_usage(input: &str) -> Result<Reference, Vec<crate::ParseError>> {
    let doc = parse(input)?;
    let mut uses: Vec<(Reference, Span)> = doc
        .items
        .into_iter()
        .filter_map(|item| match item.node {
            Item::Use(r) => Some((r, item.span)),
            _ => None,
        })
        .collect();

    if uses.len() == 1 {
        Ok(uses.remove(0).0)
    } else {
        Err(vec![crate::ParseError::Syntax {
            span: 0..input.len(),
            message: "expected a single usage statement".to_string(),
            expected: vec!["'@Style'".into(), "'@Element'".into(), "'@Var'".into()],
        }])
    }
}

/// Helper to extract span range from chumsky's MapExtra
fn span_range(e: &impl chumsky::span::Span<Offset = usize>) -> std::ops::Range<usize> {
    e.start()..e.end()
}

/// Render a numeric token back to value text (`12` rather than `12.0`)
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn document_parser<'a, I>() -> impl Parser<'a, I, Document, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    // Basic token parsers
    let identifier = select! {
        Token::Ident(s) => Identifier::new(s),
    }
    .map_with(|id, e| Spanned::new(id, span_range(&e.span())));

    let string_literal = select! {
        Token::String(s) => s,
    }
    .map_with(|s, e| Spanned::new(s, span_range(&e.span())));

    // Zero-based index in `tag[n]` selectors
    let index = select! {
        Token::Number(n) => n,
    }
    .try_map(|n, span| {
        if n >= 0.0 && n.fract() == 0.0 {
            Ok(n as usize)
        } else {
            Err(Rich::custom(span, "index must be a non-negative integer"))
        }
    });

    let kind = choice((
        just(Token::AtStyle).to(TemplateKind::Style),
        just(Token::AtElement).to(TemplateKind::Element),
        just(Token::AtVar).to(TemplateKind::Var),
    ));

    let header = choice((
        just(Token::TemplateHeader).to(DefinitionOrigin::Template),
        just(Token::CustomHeader).to(DefinitionOrigin::Custom),
    ));

    // ==================== Values ====================

    // One raw word of an opaque CSS value
    let value_word = select! {
        Token::Ident(s) => s,
        Token::Dimension(d) => d,
        Token::HexColor(c) => c,
        Token::String(s) => s,
        Token::Number(n) => format_number(n),
    };

    // Variable lookup: `Theme(primary)` or `Theme(primary = "red")`
    // Must be tried before the generic function form below.
    let var_ref = identifier
        .clone()
        .then(
            identifier
                .clone()
                .then(
                    just(Token::Equals)
                        .ignore_then(value_word.clone())
                        .or_not(),
                )
                .delimited_by(just(Token::ParenOpen), just(Token::ParenClose)),
        )
        .map(|(group, (name, override_value))| StyleValue::VarRef {
            group,
            name,
            override_value,
        });

    // CSS function call kept as raw text: `rgb(255, 192, 203)`
    let func_call = select! { Token::Ident(s) => s }
        .then(
            value_word
                .clone()
                .repeated()
                .at_least(1)
                .collect::<Vec<_>>()
                .map(|words| words.join(" "))
                .separated_by(just(Token::Comma))
                .at_least(1)
                .collect::<Vec<_>>()
                .delimited_by(just(Token::ParenOpen), just(Token::ParenClose)),
        )
        .map(|(name, args)| format!("{}({})", name, args.join(", ")));

    // Opaque value: one or more words/function calls up to the semicolon
    let literal_value = choice((func_call, value_word.clone()))
        .repeated()
        .at_least(1)
        .collect::<Vec<_>>()
        .map(|parts| StyleValue::Literal(parts.join(" ")));

    let style_value = choice((var_ref, literal_value));

    // ==================== Selectors ====================

    // `text` is a keyword token but a legal selector tag (`delete text;`
    // removes text nodes).
    let tag_name = choice((
        identifier.clone(),
        just(Token::Text)
            .map_with(|_, e| Spanned::new(Identifier::new("text"), span_range(&e.span()))),
    ));

    let selector = tag_name
        .clone()
        .then(
            index
                .clone()
                .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
                .or_not(),
        )
        .map(|(tag, index)| Selector { tag, index });

    // Selector with a mandatory index, for `div[1] { ... }` access
    let indexed_selector = tag_name
        .clone()
        .then(index.delimited_by(just(Token::BracketOpen), just(Token::BracketClose)))
        .map(|(tag, index)| Selector {
            tag,
            index: Some(index),
        });

    // ==================== Style specialization ops ====================

    // `delete @Kind Name;` - remove one ancestor's contribution
    let delete_inheritance = just(Token::Delete)
        .ignore_then(kind.clone())
        .then(identifier.clone())
        .then_ignore(just(Token::Semicolon))
        .map(|(kind, name)| vec![SpecializationOp::DeleteInheritance { kind, name }]);

    // `delete color, font-size;` in a style context
    let delete_properties = just(Token::Delete)
        .ignore_then(
            identifier
                .clone()
                .separated_by(just(Token::Comma))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .then_ignore(just(Token::Semicolon))
        .map(|names| {
            names
                .into_iter()
                .map(|name| SpecializationOp::DeleteProperty { name })
                .collect::<Vec<_>>()
        });

    // `property: value;` in a usage body - valueless fill or override
    let set_property = identifier
        .clone()
        .then_ignore(just(Token::Colon))
        .then(style_value.clone())
        .then_ignore(just(Token::Semicolon))
        .map(|(name, value)| vec![SpecializationOp::SetProperty { name, value }]);

    // One item of a `@Style Name { ... }` usage body. Each item may expand to
    // several operations; all carry the item's span.
    let style_spec_item = choice((
        delete_inheritance.clone(),
        delete_properties.clone(),
        set_property.clone(),
    ))
    .map_with(|ops, e| {
        let span = span_range(&e.span());
        ops.into_iter()
            .map(|op| Spanned::new(op, span.clone()))
            .collect::<Vec<_>>()
    });

    let style_spec_body = style_spec_item
        .clone()
        .repeated()
        .collect::<Vec<_>>()
        .map(|items| items.into_iter().flatten().collect::<Vec<_>>())
        .delimited_by(just(Token::BraceOpen), just(Token::BraceClose));

    // ==================== Style entries ====================

    // `property: value;` / `property;` / `property, property;`
    // The bare forms are valueless properties, legal only in a [Custom]
    // declaration (checked when the definition is built).
    let property_entries = identifier
        .clone()
        .then(choice((
            just(Token::Colon)
                .ignore_then(style_value.clone())
                .then_ignore(just(Token::Semicolon))
                .map(PropTail::Value),
            just(Token::Comma)
                .ignore_then(
                    identifier
                        .clone()
                        .separated_by(just(Token::Comma))
                        .at_least(1)
                        .collect::<Vec<_>>(),
                )
                .then_ignore(just(Token::Semicolon))
                .map(PropTail::MoreValueless),
            just(Token::Semicolon).to(PropTail::Bare),
        )))
        .map_with(|(first, tail), e| {
            let span = span_range(&e.span());
            match tail {
                PropTail::Value(value) => vec![Spanned::new(
                    StyleEntry::Property { name: first, value },
                    span,
                )],
                PropTail::MoreValueless(rest) => {
                    let mut out = vec![Spanned::new(StyleEntry::Valueless(first), span.clone())];
                    out.extend(
                        rest.into_iter()
                            .map(|name| Spanned::new(StyleEntry::Valueless(name), span.clone())),
                    );
                    out
                }
                PropTail::Bare => vec![Spanned::new(StyleEntry::Valueless(first), span)],
            }
        });

    // ==================== Nodes and usages (mutually recursive) ====================

    let mut node = Recursive::declare();

    // Element specialization ops need the node parser for insert content and
    // themselves for nested index access.
    let element_spec_op = recursive(|elem_op| {
        // `insert after div[0] { ... }` / `insert at top { ... }`
        let anchored_position = choice((
            just(Token::Before).to(InsertPosition::Before),
            just(Token::After).to(InsertPosition::After),
            just(Token::Replace).to(InsertPosition::Replace),
        ));

        let edge_position = just(Token::At).ignore_then(choice((
            just(Token::Top).to(InsertPosition::AtTop),
            just(Token::Bottom).to(InsertPosition::AtBottom),
        )));

        let insert_content = node
            .clone()
            .repeated()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::BraceOpen), just(Token::BraceClose));

        let insert_op = just(Token::Insert)
            .ignore_then(choice((
                anchored_position
                    .then(selector.clone())
                    .map(|(position, sel)| (position, Some(sel))),
                edge_position.map(|position| (position, None)),
            )))
            .then(insert_content)
            .map(|((position, sel), content)| {
                vec![SpecializationOp::InsertElement {
                    position,
                    selector: sel,
                    content,
                }]
            });

        // `delete span, div[1];` in an element context
        let delete_elements = just(Token::Delete)
            .ignore_then(
                selector
                    .clone()
                    .separated_by(just(Token::Comma))
                    .at_least(1)
                    .collect::<Vec<_>>(),
            )
            .then_ignore(just(Token::Semicolon))
            .map(|sels| {
                sels.into_iter()
                    .map(|selector| SpecializationOp::DeleteElement { selector })
                    .collect::<Vec<_>>()
            });

        // `style { ... }` inside an index body - property fills and deletes
        let index_style_ops = just(Token::Style)
            .ignore_then(
                choice((delete_properties.clone(), set_property.clone()))
                    .repeated()
                    .collect::<Vec<_>>()
                    .map(|items| items.into_iter().flatten().collect::<Vec<_>>())
                    .delimited_by(just(Token::BraceOpen), just(Token::BraceClose)),
            );

        // `div[1] { ... }` - narrow to one sibling before nested ops
        let index_access = indexed_selector
            .clone()
            .then(
                choice((
                    elem_op.clone(),
                    index_style_ops.map_with(|ops: Vec<SpecializationOp>, e| {
                        let span = span_range(&e.span());
                        ops.into_iter()
                            .map(|op| Spanned::new(op, span.clone()))
                            .collect::<Vec<Spanned<SpecializationOp>>>()
                    }),
                ))
                .repeated()
                .collect::<Vec<_>>()
                .map(|items| items.into_iter().flatten().collect::<Vec<_>>())
                .delimited_by(just(Token::BraceOpen), just(Token::BraceClose)),
            )
            .map(|(sel, ops)| vec![SpecializationOp::IndexAccess { selector: sel, ops }]);

        // Note: delete_inheritance must come before delete_elements since both
        // start with 'delete'.
        choice((
            delete_inheritance.clone(),
            delete_elements,
            insert_op,
            index_access,
        ))
        .map_with(|ops, e| {
            let span = span_range(&e.span());
            ops.into_iter()
                .map(|op| Spanned::new(op, span.clone()))
                .collect::<Vec<_>>()
        })
    });

    let element_spec_body = element_spec_op
        .clone()
        .repeated()
        .collect::<Vec<_>>()
        .map(|items: Vec<Vec<Spanned<SpecializationOp>>>| {
            items.into_iter().flatten().collect::<Vec<_>>()
        })
        .delimited_by(just(Token::BraceOpen), just(Token::BraceClose));

    // Usage statement: `@Kind Name;` or `@Kind Name { specializations }`
    // The specialization body grammar depends on the referenced kind, so each
    // kind gets its own arm.
    let use_stmt = choice((
        just(Token::AtStyle)
            .ignore_then(identifier.clone())
            .then(choice((
                just(Token::Semicolon).to(Vec::new()),
                style_spec_body
                    .clone()
                    .then_ignore(just(Token::Semicolon).or_not()),
            )))
            .map(|(name, specializations)| Reference {
                kind: TemplateKind::Style,
                name,
                inheritance: InheritanceKind::Composition,
                specializations,
            }),
        just(Token::AtElement)
            .ignore_then(identifier.clone())
            .then(choice((
                just(Token::Semicolon).to(Vec::new()),
                element_spec_body
                    .clone()
                    .then_ignore(just(Token::Semicolon).or_not()),
            )))
            .map(|(name, specializations)| Reference {
                kind: TemplateKind::Element,
                name,
                inheritance: InheritanceKind::Composition,
                specializations,
            }),
        just(Token::AtVar)
            .ignore_then(identifier.clone())
            .then_ignore(just(Token::Semicolon))
            .map(|name| Reference::composition(TemplateKind::Var, name)),
    ));

    // `inherit @Kind Name;` - explicit ancestor
    let inherit_stmt = just(Token::Inherit)
        .ignore_then(kind.clone())
        .then(identifier.clone())
        .then_ignore(just(Token::Semicolon))
        .map_with(|(kind, name), e| {
            Spanned::new(
                Reference {
                    kind,
                    name,
                    inheritance: InheritanceKind::Explicit,
                    specializations: Vec::new(),
                },
                span_range(&e.span()),
            )
        });

    // Style entries shared by declaration bodies and local `style { }` blocks
    let style_entries = choice((
        use_stmt.clone().map_with(|r, e| {
            vec![Spanned::new(StyleEntry::Use(r), span_range(&e.span()))]
        }),
        property_entries.clone(),
    ));

    let style_block = just(Token::Style).ignore_then(
        style_entries
            .clone()
            .repeated()
            .collect::<Vec<_>>()
            .map(|items| items.into_iter().flatten().collect::<Vec<_>>())
            .delimited_by(just(Token::BraceOpen), just(Token::BraceClose)),
    );

    // `text { "Hello" }`
    let text_node = just(Token::Text).ignore_then(
        string_literal
            .clone()
            .repeated()
            .at_least(1)
            .collect::<Vec<_>>()
            .map(|parts| {
                parts
                    .into_iter()
                    .map(|s| s.node)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .delimited_by(just(Token::BraceOpen), just(Token::BraceClose)),
    );

    // Concrete element: `tag { style { .. } children.. }`
    let element_node = identifier
        .clone()
        .then(
            choice((
                style_block.clone().map(ElemPart::Style),
                node.clone().map(ElemPart::Child),
            ))
            .repeated()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::BraceOpen), just(Token::BraceClose)),
        )
        .map(|(tag, parts)| {
            let mut style = Vec::new();
            let mut children = Vec::new();
            for part in parts {
                match part {
                    ElemPart::Style(entries) => style.extend(entries),
                    ElemPart::Child(child) => children.push(child),
                }
            }
            ElementNode {
                tag,
                style,
                children,
            }
        });

    node.define(
        choice((
            text_node.clone().map(Node::Text),
            use_stmt.clone().map(Node::Use),
            element_node.clone().map(Node::Element),
        ))
        .map_with(|n, e| Spanned::new(n, span_range(&e.span())))
        .boxed(),
    );

    // ==================== Declarations ====================

    // Style declaration body: entries, inherit statements, baked delete ops
    let style_decl_body = choice((
        inherit_stmt.clone().map(StyleItem::Inherit),
        style_entries.clone().map(StyleItem::Entries),
        choice((delete_inheritance.clone(), delete_properties.clone())).map_with(|ops, e| {
            let span = span_range(&e.span());
            StyleItem::Ops(
                ops.into_iter()
                    .map(|op| Spanned::new(op, span.clone()))
                    .collect(),
            )
        }),
    ))
    .repeated()
    .collect::<Vec<_>>()
    .delimited_by(just(Token::BraceOpen), just(Token::BraceClose));

    let style_decl = header
        .clone()
        .then_ignore(just(Token::AtStyle))
        .then(identifier.clone())
        .then(style_decl_body)
        .try_map(|((origin, name), items), span| {
            let mut entries = Vec::new();
            let mut inheritance = Vec::new();
            let mut valueless = Vec::new();
            let mut specializations = Vec::new();

            for item in items {
                match item {
                    StyleItem::Inherit(r) => inheritance.push(r),
                    StyleItem::Ops(ops) => specializations.extend(ops),
                    StyleItem::Entries(list) => {
                        for entry in list {
                            if let StyleEntry::Valueless(id) = &entry.node {
                                valueless.push(Spanned::new(
                                    id.node.clone(),
                                    entry.span.clone(),
                                ));
                            }
                            entries.push(entry);
                        }
                    }
                }
            }

            if origin == DefinitionOrigin::Template && !valueless.is_empty() {
                return Err(Rich::custom(
                    span,
                    format!(
                        "valueless property '{}' is only allowed in a [Custom] declaration",
                        valueless[0].node
                    ),
                ));
            }
            if origin == DefinitionOrigin::Template && !specializations.is_empty() {
                return Err(Rich::custom(
                    span,
                    "specialization operations are only allowed in a [Custom] declaration",
                ));
            }
            check_duplicate_style_names(&entries, span)?;

            Ok(Definition {
                origin,
                kind: TemplateKind::Style,
                name,
                content: DefinitionContent::Style(entries),
                inheritance,
                valueless,
                specializations,
            })
        });

    // Element declaration body: child nodes, inherit statements, baked ops
    let element_decl_body = choice((
        inherit_stmt.clone().map(ElemItem::Inherit),
        element_spec_op.clone().map(ElemItem::Ops),
        node.clone().map(ElemItem::Child),
    ))
    .repeated()
    .collect::<Vec<_>>()
    .delimited_by(just(Token::BraceOpen), just(Token::BraceClose));

    let element_decl = header
        .clone()
        .then_ignore(just(Token::AtElement))
        .then(identifier.clone())
        .then(element_decl_body)
        .try_map(|((origin, name), items), span| {
            let mut children = Vec::new();
            let mut inheritance = Vec::new();
            let mut specializations = Vec::new();

            for item in items {
                match item {
                    ElemItem::Inherit(r) => inheritance.push(r),
                    ElemItem::Ops(ops) => specializations.extend(ops),
                    ElemItem::Child(child) => children.push(child),
                }
            }

            if origin == DefinitionOrigin::Template && !specializations.is_empty() {
                return Err(Rich::custom(
                    span,
                    "specialization operations are only allowed in a [Custom] declaration",
                ));
            }

            Ok(Definition {
                origin,
                kind: TemplateKind::Element,
                name,
                content: DefinitionContent::Element(children),
                inheritance,
                valueless: Vec::new(),
                specializations,
            })
        });

    // Var declaration body: `name: value;` pairs plus inherit statements
    let var_pair = identifier
        .clone()
        .then_ignore(just(Token::Colon))
        .then(style_value.clone())
        .then_ignore(just(Token::Semicolon));

    let var_decl_body = choice((
        inherit_stmt.clone().map(VarItem::Inherit),
        var_pair.map(|(key, value)| VarItem::Pair(key, value)),
    ))
    .repeated()
    .collect::<Vec<_>>()
    .delimited_by(just(Token::BraceOpen), just(Token::BraceClose));

    let var_decl = header
        .clone()
        .then_ignore(just(Token::AtVar))
        .then(identifier.clone())
        .then(var_decl_body)
        .try_map(|((origin, name), items), span| {
            let mut pairs: Vec<(Spanned<Identifier>, StyleValue)> = Vec::new();
            let mut inheritance = Vec::new();

            for item in items {
                match item {
                    VarItem::Pair(key, value) => {
                        if pairs.iter().any(|(k, _)| k.node == key.node) {
                            return Err(Rich::custom(
                                span,
                                format!("duplicate variable name '{}'", key.node),
                            ));
                        }
                        pairs.push((key, value));
                    }
                    VarItem::Inherit(r) => inheritance.push(r),
                }
            }

            Ok(Definition {
                origin,
                kind: TemplateKind::Var,
                name,
                content: DefinitionContent::Var(pairs),
                inheritance,
                valueless: Vec::new(),
                specializations: Vec::new(),
            })
        });

    let declaration = choice((style_decl, element_decl, var_decl));

    // ==================== Document ====================

    // Note: Order matters. Declarations start with a header token, usages
    // with a kind marker, and concrete elements with a bare identifier.
    let item = choice((
        declaration.map(Item::Definition),
        use_stmt.clone().map(Item::Use),
        element_node.clone().map(Item::Element),
    ))
    .map_with(|item, e| Spanned::new(item, span_range(&e.span())))
    .recover_with(skip_then_retry_until(any().ignored(), end()));

    item.repeated()
        .collect()
        .then_ignore(end())
        .map(|items| Document { items })
}

/// Duplicate property names inside one declaration body abort that parse
fn check_duplicate_style_names<'a>(
    entries: &[Spanned<StyleEntry>],
    span: SimpleSpan,
) -> Result<(), Rich<'a, Token>> {
    let mut seen: Vec<&str> = Vec::new();
    for entry in entries {
        let name = match &entry.node {
            StyleEntry::Property { name, .. } => Some(name.node.as_str()),
            StyleEntry::Valueless(name) => Some(name.node.as_str()),
            StyleEntry::Use(_) => None,
        };
        if let Some(name) = name {
            if seen.contains(&name) {
                return Err(Rich::custom(
                    span,
                    format!("duplicate property name '{}'", name),
                ));
            }
            seen.push(name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_definition(source: &str) -> Definition {
        let doc = parse(source).expect("Should parse");
        assert_eq!(doc.items.len(), 1);
        match doc.items.into_iter().next().unwrap().node {
            Item::Definition(def) => def,
            other => panic!("Expected definition, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_template_style() {
        let def = single_definition(
            "[Template] @Style DefaultText { color: black; font-size: 16px; }",
        );
        assert_eq!(def.origin, DefinitionOrigin::Template);
        assert_eq!(def.kind, TemplateKind::Style);
        assert_eq!(def.name.node.as_str(), "DefaultText");
        match &def.content {
            DefinitionContent::Style(entries) => {
                assert_eq!(entries.len(), 2);
                match &entries[0].node {
                    StyleEntry::Property { name, value } => {
                        assert_eq!(name.node.as_str(), "color");
                        assert_eq!(value, &StyleValue::Literal("black".to_string()));
                    }
                    other => panic!("Expected property, got {:?}", other),
                }
                match &entries[1].node {
                    StyleEntry::Property { name, value } => {
                        assert_eq!(name.node.as_str(), "font-size");
                        assert_eq!(value, &StyleValue::Literal("16px".to_string()));
                    }
                    other => panic!("Expected property, got {:?}", other),
                }
            }
            other => panic!("Expected style content, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_custom_valueless_list() {
        let def = single_definition(
            "[Custom] @Style TextSet { color, font-size; line-height: 1.5; }",
        );
        assert_eq!(def.origin, DefinitionOrigin::Custom);
        assert_eq!(def.valueless.len(), 2);
        assert_eq!(def.valueless[0].node.as_str(), "color");
        assert_eq!(def.valueless[1].node.as_str(), "font-size");
        match &def.content {
            DefinitionContent::Style(entries) => assert_eq!(entries.len(), 3),
            other => panic!("Expected style content, got {:?}", other),
        }
    }

    #[test]
    fn test_template_valueless_rejected() {
        let errs = parse("[Template] @Style Bad { color; }").unwrap_err();
        assert!(!errs.is_empty());
        assert!(errs[0]
            .to_string()
            .contains("only allowed in a [Custom] declaration"));
    }

    #[test]
    fn test_duplicate_property_rejected() {
        let errs = parse("[Template] @Style Bad { color: red; color: blue; }").unwrap_err();
        assert!(errs[0].to_string().contains("duplicate property name"));
    }

    #[test]
    fn test_parse_element_declaration() {
        let def = single_definition(
            r#"[Template] @Element Card {
                div {
                    style { @Style DefaultText; color: red; }
                    text { "hello" }
                }
                span { }
            }"#,
        );
        assert_eq!(def.kind, TemplateKind::Element);
        let children = match &def.content {
            DefinitionContent::Element(nodes) => nodes,
            other => panic!("Expected element content, got {:?}", other),
        };
        assert_eq!(children.len(), 2);
        match &children[0].node {
            Node::Element(el) => {
                assert_eq!(el.tag.node.as_str(), "div");
                assert_eq!(el.style.len(), 2);
                assert!(matches!(el.style[0].node, StyleEntry::Use(_)));
                assert_eq!(el.children.len(), 1);
                match &el.children[0].node {
                    Node::Text(t) => assert_eq!(t, "hello"),
                    other => panic!("Expected text, got {:?}", other),
                }
            }
            other => panic!("Expected element, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_var_declaration() {
        let def = single_definition(
            r#"[Template] @Var Theme { primary: "blue"; tableColor: rgb(255, 192, 203); }"#,
        );
        assert_eq!(def.kind, TemplateKind::Var);
        match &def.content {
            DefinitionContent::Var(pairs) => {
                assert_eq!(pairs.len(), 2);
                assert_eq!(pairs[0].0.node.as_str(), "primary");
                assert_eq!(pairs[0].1, StyleValue::Literal("blue".to_string()));
                assert_eq!(
                    pairs[1].1,
                    StyleValue::Literal("rgb(255, 192, 203)".to_string())
                );
            }
            other => panic!("Expected var content, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_var_name_rejected() {
        let errs = parse("[Template] @Var Theme { a: x; a: y; }").unwrap_err();
        assert!(errs[0].to_string().contains("duplicate variable name"));
    }

    #[test]
    fn test_inherit_statements_collected() {
        let def = single_definition(
            "[Custom] @Style S { color: red; inherit @Style A; inherit @Style B; }",
        );
        assert_eq!(def.inheritance.len(), 2);
        assert_eq!(def.inheritance[0].node.name.node.as_str(), "A");
        assert_eq!(def.inheritance[1].node.name.node.as_str(), "B");
        assert!(def
            .inheritance
            .iter()
            .all(|r| r.node.inheritance == InheritanceKind::Explicit));
    }

    #[test]
    fn test_composition_use_in_element_body() {
        let def = single_definition("[Custom] @Element Panel { @Element Card; div { } }");
        let children = match &def.content {
            DefinitionContent::Element(nodes) => nodes,
            other => panic!("Expected element content, got {:?}", other),
        };
        match &children[0].node {
            Node::Use(r) => {
                assert_eq!(r.kind, TemplateKind::Element);
                assert_eq!(r.name.node.as_str(), "Card");
                assert_eq!(r.inheritance, InheritanceKind::Composition);
            }
            other => panic!("Expected use, got {:?}", other),
        }
    }

    #[test]
    fn test_style_usage_specializations() {
        let doc = parse(
            r#"div {
                style {
                    @Style TextSet {
                        color: red;
                        delete line-height;
                        delete @Style DefaultText;
                    }
                }
            }"#,
        )
        .expect("Should parse");
        let el = match &doc.items[0].node {
            Item::Element(el) => el,
            other => panic!("Expected element, got {:?}", other),
        };
        let r = match &el.style[0].node {
            StyleEntry::Use(r) => r,
            other => panic!("Expected use, got {:?}", other),
        };
        assert_eq!(r.specializations.len(), 3);
        assert!(matches!(
            r.specializations[0].node,
            SpecializationOp::SetProperty { .. }
        ));
        assert!(matches!(
            r.specializations[1].node,
            SpecializationOp::DeleteProperty { .. }
        ));
        assert!(matches!(
            r.specializations[2].node,
            SpecializationOp::DeleteInheritance { .. }
        ));
    }

    #[test]
    fn test_element_usage_specializations() {
        let doc = parse(
            r#"@Element Panel {
                delete span;
                insert after div[0] { span { } }
                insert at top { text { "first" } }
                div[1] {
                    delete text;
                    style { color: blue; }
                }
            }"#,
        )
        .expect("Should parse");
        let r = match &doc.items[0].node {
            Item::Use(r) => r,
            other => panic!("Expected use, got {:?}", other),
        };
        assert_eq!(r.specializations.len(), 4);
        match &r.specializations[0].node {
            SpecializationOp::DeleteElement { selector } => {
                assert_eq!(selector.to_string(), "span");
            }
            other => panic!("Expected element delete, got {:?}", other),
        }
        match &r.specializations[1].node {
            SpecializationOp::InsertElement {
                position,
                selector,
                content,
            } => {
                assert_eq!(*position, InsertPosition::After);
                assert_eq!(selector.as_ref().unwrap().to_string(), "div[0]");
                assert_eq!(content.len(), 1);
            }
            other => panic!("Expected insert, got {:?}", other),
        }
        match &r.specializations[2].node {
            SpecializationOp::InsertElement {
                position, selector, ..
            } => {
                assert_eq!(*position, InsertPosition::AtTop);
                assert!(selector.is_none());
            }
            other => panic!("Expected insert, got {:?}", other),
        }
        match &r.specializations[3].node {
            SpecializationOp::IndexAccess { selector, ops } => {
                assert_eq!(selector.to_string(), "div[1]");
                assert_eq!(ops.len(), 2);
                assert!(matches!(
                    ops[0].node,
                    SpecializationOp::DeleteElement { .. }
                ));
                assert!(matches!(ops[1].node, SpecializationOp::SetProperty { .. }));
            }
            other => panic!("Expected index access, got {:?}", other),
        }
    }

    #[test]
    fn test_var_reference_values() {
        let doc = parse(
            r#"div {
                style {
                    color: Theme(primary);
                    background: Theme(primary = "red");
                }
            }"#,
        )
        .expect("Should parse");
        let el = match &doc.items[0].node {
            Item::Element(el) => el,
            other => panic!("Expected element, got {:?}", other),
        };
        match &el.style[0].node {
            StyleEntry::Property { value, .. } => match value {
                StyleValue::VarRef {
                    group,
                    name,
                    override_value,
                } => {
                    assert_eq!(group.node.as_str(), "Theme");
                    assert_eq!(name.node.as_str(), "primary");
                    assert!(override_value.is_none());
                }
                other => panic!("Expected var ref, got {:?}", other),
            },
            other => panic!("Expected property, got {:?}", other),
        }
        match &el.style[1].node {
            StyleEntry::Property { value, .. } => match value {
                StyleValue::VarRef { override_value, .. } => {
                    assert_eq!(override_value.as_deref(), Some("red"));
                }
                other => panic!("Expected var ref, got {:?}", other),
            },
            other => panic!("Expected property, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_usage_entry_point() {
        let r = parse_usage("@Element Card;").expect("Should parse");
        assert_eq!(r.kind, TemplateKind::Element);
        assert_eq!(r.name.node.as_str(), "Card");
        assert!(r.specializations.is_empty());

        assert!(parse_usage("[Template] @Style S { color: red; }").is_err());
    }

    #[test]
    fn test_top_level_recovery() {
        // The malformed declaration aborts only itself; the good one in the
        // same source still comes back alongside the error.
        let (doc, errors) = parse_recovering(
            "[Template] @Style Bad { color }\n[Template] @Var Theme { a: b; }",
        );
        assert!(!errors.is_empty());
        let doc = doc.expect("Should recover a document");
        assert_eq!(doc.items.len(), 1);
        match &doc.items[0].node {
            Item::Definition(def) => {
                assert_eq!(def.kind, TemplateKind::Var);
                assert_eq!(def.name.node.as_str(), "Theme");
            }
            other => panic!("Expected definition, got {:?}", other),
        }
    }

    #[test]
    fn test_strict_parse_rejects_recovered_documents() {
        let errs = parse("[Template] @Style Bad { color }\ndiv { }").unwrap_err();
        assert!(!errs.is_empty());
    }

    #[test]
    fn test_template_specialization_ops_rejected() {
        let errs = parse("[Template] @Style Bad { delete color; }").unwrap_err();
        assert!(errs[0]
            .to_string()
            .contains("only allowed in a [Custom] declaration"));
    }
}
