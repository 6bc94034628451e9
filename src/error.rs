//! Error and diagnostic types for parsing and expansion

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Parse error at {span:?}: {message}")]
    Syntax {
        span: Span,
        message: String,
        expected: Vec<String>,
    },
}

impl ParseError {
    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        let mut buf = Vec::new();
        match self {
            ParseError::Syntax {
                span,
                message,
                expected,
            } => {
                let expected_str = if expected.is_empty() {
                    String::new()
                } else {
                    format!("\nExpected: {}", expected.join(", "))
                };

                Report::build(ReportKind::Error, filename, span.start)
                    .with_message(message)
                    .with_label(
                        Label::new((filename, span.clone()))
                            .with_message(format!("{}{}", message, expected_str))
                            .with_color(Color::Red),
                    )
                    .finish()
                    .write((filename, Source::from(source)), &mut buf)
                    .unwrap();
            }
        }
        String::from_utf8(buf).unwrap()
    }

    /// The source range this error points at
    pub fn span(&self) -> Span {
        match self {
            ParseError::Syntax { span, .. } => span.clone(),
        }
    }

    /// The bare message, without the span prefix of the `Display` form
    pub fn message(&self) -> &str {
        match self {
            ParseError::Syntax { message, .. } => message,
        }
    }
}

impl<'a> From<chumsky::error::Rich<'a, crate::parser::lexer::Token>> for ParseError {
    fn from(err: chumsky::error::Rich<'a, crate::parser::lexer::Token>) -> Self {
        use crate::parser::lexer::Token;
        use chumsky::error::RichReason;

        // Check if we found a reserved keyword where a name was expected
        let found_token = err.found().cloned();
        let is_reserved_keyword = matches!(
            found_token,
            Some(Token::Inherit)
                | Some(Token::Delete)
                | Some(Token::Insert)
                | Some(Token::Before)
                | Some(Token::After)
                | Some(Token::Replace)
                | Some(Token::Text)
                | Some(Token::Style)
        );

        let message = match err.reason() {
            RichReason::ExpectedFound { found, .. } => {
                if is_reserved_keyword {
                    let keyword = match found_token.as_ref().unwrap() {
                        Token::Inherit => "inherit",
                        Token::Delete => "delete",
                        Token::Insert => "insert",
                        Token::Before => "before",
                        Token::After => "after",
                        Token::Replace => "replace",
                        Token::Text => "text",
                        Token::Style => "style",
                        _ => "unknown",
                    };
                    format!(
                        "Cannot use '{}' as a name - it's a reserved keyword",
                        keyword
                    )
                } else {
                    let found_str = match found {
                        Some(tok) => format_token(tok),
                        None => "end of input".to_string(),
                    };
                    format!("Unexpected {}", found_str)
                }
            }
            RichReason::Custom(msg) => msg.to_string(),
        };

        let expected: Vec<String> = err
            .expected()
            .filter_map(|e| match e {
                chumsky::error::RichPattern::Token(tok) => Some(format_token(tok)),
                chumsky::error::RichPattern::Label(label) => Some(label.to_string()),
                chumsky::error::RichPattern::EndOfInput => Some("end of input".to_string()),
                chumsky::error::RichPattern::Identifier(s) => Some(format!("identifier '{}'", s)),
                chumsky::error::RichPattern::Any => Some("any token".to_string()),
                chumsky::error::RichPattern::SomethingElse => None,
            })
            .collect();

        ParseError::Syntax {
            span: err.span().into_range(),
            message,
            expected,
        }
    }
}

/// Format a token for human-readable error messages
fn format_token(tok: &crate::parser::lexer::Token) -> String {
    use crate::parser::lexer::Token;
    match tok {
        Token::Ident(s) => format!("identifier '{}'", s),
        Token::String(s) => format!("string \"{}\"", s),
        Token::Number(n) => format!("number {}", n),
        Token::Dimension(d) => format!("dimension {}", d),
        Token::HexColor(c) => format!("color {}", c),
        Token::TemplateHeader => "'[Template]'".to_string(),
        Token::CustomHeader => "'[Custom]'".to_string(),
        Token::AtStyle => "'@Style'".to_string(),
        Token::AtElement => "'@Element'".to_string(),
        Token::AtVar => "'@Var'".to_string(),
        Token::Inherit => "keyword 'inherit'".to_string(),
        Token::Delete => "keyword 'delete'".to_string(),
        Token::Insert => "keyword 'insert'".to_string(),
        Token::Before => "keyword 'before'".to_string(),
        Token::After => "keyword 'after'".to_string(),
        Token::Replace => "keyword 'replace'".to_string(),
        Token::At => "keyword 'at'".to_string(),
        Token::Top => "keyword 'top'".to_string(),
        Token::Bottom => "keyword 'bottom'".to_string(),
        Token::Text => "keyword 'text'".to_string(),
        Token::Style => "keyword 'style'".to_string(),
        Token::BraceOpen => "'{'".to_string(),
        Token::BraceClose => "'}'".to_string(),
        Token::BracketOpen => "'['".to_string(),
        Token::BracketClose => "']'".to_string(),
        Token::ParenOpen => "'('".to_string(),
        Token::ParenClose => "')'".to_string(),
        Token::Colon => "':'".to_string(),
        Token::Semicolon => "';'".to_string(),
        Token::Comma => "','".to_string(),
        Token::Equals => "'='".to_string(),
        _ => format!("{:?}", tok),
    }
}

/// Severity of an accumulated diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A recorded problem that does not abort the pass
///
/// The driver collects these across every declaration and usage site and
/// reports them together at end of pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Option<Span>,
}

impl Diagnostic {
    pub fn warning(message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            span,
        }
    }

    pub fn error(message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            span,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match &self.span {
            Some(span) => write!(f, "{} at {:?}: {}", tag, span, self.message),
            None => write!(f, "{}: {}", tag, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_display() {
        let warn = Diagnostic::warning("delete target 'color' not found", Some(4..9));
        assert_eq!(
            warn.to_string(),
            "warning at 4..9: delete target 'color' not found"
        );
        assert!(!warn.is_error());

        let err = Diagnostic::error("duplicate definition", None);
        assert_eq!(err.to_string(), "error: duplicate definition");
        assert!(err.is_error());
    }
}
