//! Lexer for the CHTL template language using logos

use logos::Logos;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum Token {
    // Declaration headers
    #[token("[Template]")]
    TemplateHeader,
    #[token("[Custom]")]
    CustomHeader,

    // Kind markers
    #[token("@Style")]
    AtStyle,
    #[token("@Element")]
    AtElement,
    #[token("@Var")]
    AtVar,

    // Inheritance / specialization keywords
    #[token("inherit")]
    Inherit,
    #[token("delete")]
    Delete,
    #[token("insert")]
    Insert,
    #[token("before")]
    Before,
    #[token("after")]
    After,
    #[token("replace")]
    Replace,
    #[token("at")]
    At,
    #[token("top")]
    Top,
    #[token("bottom")]
    Bottom,

    // Structural keywords
    #[token("text")]
    Text,
    #[token("style")]
    Style,

    // Delimiters
    #[token("{")]
    BraceOpen,
    #[token("}")]
    BraceClose,
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token("=")]
    Equals,

    // Literals - identifiers must come after keywords.
    // Hyphens are allowed mid-identifier for CSS property names (font-size).
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_-]*", |lex| lex.slice().to_string(), priority = 1)]
    Ident(String),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        s[1..s.len()-1].to_string()
    })]
    String(String),

    // A number with a unit suffix (16px, 1.5em, 50%) kept as raw text
    #[regex(r"[0-9]+(\.[0-9]+)?([a-zA-Z]+|%)", |lex| lex.slice().to_string())]
    Dimension(String),

    #[regex(r"[0-9]+(\.[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[regex(r"#[0-9a-fA-F]{3,8}", |lex| lex.slice().to_string())]
    HexColor(String),

    // Comments (skip)
    #[regex(r"//[^\n]*", logos::skip)]
    LineComment,

    #[regex(r"/\*([^*]|\*[^/])*\*/", logos::skip)]
    BlockComment,
}

/// Lex input string into tokens with spans
pub fn lex(input: &str) -> impl Iterator<Item = (Token, Span)> + '_ {
    Token::lexer(input)
        .spanned()
        .filter_map(|(tok, span)| tok.ok().map(|t| (t, span)))
}
