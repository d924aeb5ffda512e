//! Directive lexer (tokenizer).
//!
//! Converts the text of a paragraph into a stream of spanned [`Token`]s:
//! literal text and the `{{ ... }}` directives of the template grammar.
//!
//! | Source | Token |
//! |---|---|
//! | `{{name}}`, `{{this}}`, `{{@index}}` | [`TokenKind::Variable`] |
//! | `{{#if cond}}` / `{{else}}` / `{{/if}}` | `IfOpen` / `Else` / `IfClose` |
//! | `{{#each list}}` / `{{/each}}` | `EachOpen` / `EachClose` |
//! | `{{#block "id"}}` / `{{/block}}` | `BlockOpen` / `BlockClose` |
//! | `{{extends "name"}}` | `Extends` |
//! | `{{#image name}}` | `Image` |
//!
//! Whitespace inside the braces is ignored. An unterminated `{{` is literal
//! text. Anything else between braces is an unknown directive: literal text,
//! or an error in strict mode.

use docweave_core::{ParseError, ParseErrorKind, Position};
use once_cell::sync::Lazy;
use regex::Regex;

/// Valid variable, condition, list and image names: a letter, `_` or `@`
/// followed by letters, digits, `_`, `.`, `@` or `-`.
static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{L}_@][\p{L}\p{N}_.@-]*$").expect("valid name regex"));

/// What a token is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Literal text.
    Text(String),
    /// `{{path}}`.
    Variable(String),
    /// `{{#if cond}}`.
    IfOpen(String),
    /// `{{else}}`.
    Else,
    /// `{{/if}}`.
    IfClose,
    /// `{{#each list}}`.
    EachOpen(String),
    /// `{{/each}}`.
    EachClose,
    /// `{{#block "id"}}`.
    BlockOpen(String),
    /// `{{/block}}`.
    BlockClose,
    /// `{{extends "name"}}`.
    Extends(String),
    /// `{{#image name}}`.
    Image(String),
}

impl TokenKind {
    /// Returns `true` for directives that open, close or split a region, or
    /// declare a parent. Such a directive may stand alone in a paragraph and
    /// span sibling paragraphs and tables.
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::IfOpen(_)
                | Self::Else
                | Self::IfClose
                | Self::EachOpen(_)
                | Self::EachClose
                | Self::BlockOpen(_)
                | Self::BlockClose
                | Self::Extends(_)
        )
    }
}

/// A token with the byte range it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
}

impl Token {
    const fn new(kind: TokenKind, start: usize, end: usize) -> Self {
        Self { kind, start, end }
    }
}

/// Tokenizes `source`.
///
/// Adjacent literal text is merged into a single token. The returned
/// positions carry paragraph `0`; callers that know the paragraph patch it
/// in.
///
/// # Errors
///
/// Returns `MalformedDirective` for a known directive with a missing or
/// invalid argument, and `UnknownDirective` for anything else between braces
/// when `strict` is set.
pub fn tokenize(source: &str, strict: bool) -> Result<Vec<Token>, ParseError> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut cursor = 0;

    while cursor < source.len() {
        let Some(rel_open) = source[cursor..].find("{{") else {
            push_text(&mut tokens, source, cursor, source.len());
            break;
        };
        let open = cursor + rel_open;
        let Some(rel_close) = source[open + 2..].find("}}") else {
            push_text(&mut tokens, source, cursor, source.len());
            break;
        };
        let close = open + 2 + rel_close;
        let inner = &source[open + 2..close];

        // `{{ a {{b}}`: the first `{{` is literal; retry from the inner one.
        if let Some(nested) = inner.rfind("{{") {
            let restart = open + 2 + nested;
            push_text(&mut tokens, source, cursor, restart);
            cursor = restart;
            continue;
        }

        let end = close + 2;
        match classify(inner.trim()) {
            Ok(Some(kind)) => {
                push_text(&mut tokens, source, cursor, open);
                tokens.push(Token::new(kind, open, end));
            }
            Ok(None) if strict => {
                return Err(ParseError::new(
                    ParseErrorKind::UnknownDirective(source[open..end].to_string()),
                    Position::new(0, open),
                ));
            }
            Ok(None) => push_text(&mut tokens, source, cursor, end),
            Err(()) => {
                return Err(ParseError::new(
                    ParseErrorKind::MalformedDirective(source[open..end].to_string()),
                    Position::new(0, open),
                ));
            }
        }
        cursor = end;
    }

    Ok(tokens)
}

/// Returns `true` if `name` is a valid variable, condition, list or image
/// name.
pub fn is_valid_name(name: &str) -> bool {
    NAME_RE.is_match(name)
}

/// Appends `source[start..end]` as text, merging with a preceding text token.
fn push_text(tokens: &mut Vec<Token>, source: &str, start: usize, end: usize) {
    if start >= end {
        return;
    }
    if let Some(Token {
        kind: TokenKind::Text(text),
        end: prev_end,
        ..
    }) = tokens.last_mut()
    {
        if *prev_end == start {
            text.push_str(&source[start..end]);
            *prev_end = end;
            return;
        }
    }
    tokens.push(Token::new(
        TokenKind::Text(source[start..end].to_string()),
        start,
        end,
    ));
}

/// Classifies trimmed directive content.
///
/// `Ok(None)` means "not part of the grammar"; `Err(())` means a known
/// directive with a bad argument.
fn classify(content: &str) -> Result<Option<TokenKind>, ()> {
    match content {
        "else" => return Ok(Some(TokenKind::Else)),
        "/if" => return Ok(Some(TokenKind::IfClose)),
        "/each" => return Ok(Some(TokenKind::EachClose)),
        "/block" => return Ok(Some(TokenKind::BlockClose)),
        _ => {}
    }

    let (head, rest) = content
        .split_once(char::is_whitespace)
        .map_or((content, ""), |(h, r)| (h, r.trim()));

    match head {
        "#if" => name_arg(rest).map(|n| Some(TokenKind::IfOpen(n))),
        "#each" => name_arg(rest).map(|n| Some(TokenKind::EachOpen(n))),
        "#image" => name_arg(rest).map(|n| Some(TokenKind::Image(n))),
        "#block" => quoted_arg(rest).map(|n| Some(TokenKind::BlockOpen(n))),
        "extends" => quoted_arg(rest).map(|n| Some(TokenKind::Extends(n))),
        _ if rest.is_empty() && is_valid_name(head) => Ok(Some(TokenKind::Variable(head.to_string()))),
        _ => Ok(None),
    }
}

/// A single bare (optionally quoted) name argument.
fn name_arg(arg: &str) -> Result<String, ()> {
    let name = unquote(arg).unwrap_or(arg);
    if is_valid_name(name) {
        Ok(name.to_string())
    } else {
        Err(())
    }
}

/// A block id or template name: quoted with `"` or `'`, or a bare word.
fn quoted_arg(arg: &str) -> Result<String, ()> {
    let name = match unquote(arg) {
        Some(inner) => inner,
        None if !arg.contains(char::is_whitespace) => arg,
        None => return Err(()),
    };
    if name.is_empty() || name.contains(['"', '\'', '{', '}']) {
        Err(())
    } else {
        Ok(name.to_string())
    }
}

fn unquote(arg: &str) -> Option<&str> {
    ['"', '\''].into_iter().find_map(|q| {
        arg.strip_prefix(q)
            .and_then(|s| s.strip_suffix(q))
            .filter(|_| arg.len() >= 2)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source, false)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn text(s: &str) -> TokenKind {
        TokenKind::Text(s.to_string())
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(kinds("Hello world"), vec![text("Hello world")]);
    }

    #[test]
    fn test_empty_source() {
        assert!(kinds("").is_empty());
    }

    #[test]
    fn test_variable() {
        assert_eq!(
            kinds("Hello {{name}}!"),
            vec![
                text("Hello "),
                TokenKind::Variable("name".into()),
                text("!")
            ]
        );
    }

    #[test]
    fn test_variable_with_whitespace_and_path() {
        assert_eq!(
            kinds("{{  customer.name  }}"),
            vec![TokenKind::Variable("customer.name".into())]
        );
    }

    #[test]
    fn test_reserved_names() {
        assert_eq!(
            kinds("{{@index}}{{this}}"),
            vec![
                TokenKind::Variable("@index".into()),
                TokenKind::Variable("this".into())
            ]
        );
    }

    #[test]
    fn test_non_ascii_name() {
        assert_eq!(
            kinds("{{名前}}"),
            vec![TokenKind::Variable("名前".into())]
        );
    }

    #[test]
    fn test_if_else() {
        assert_eq!(
            kinds("{{#if vip}}A{{else}}B{{/if}}"),
            vec![
                TokenKind::IfOpen("vip".into()),
                text("A"),
                TokenKind::Else,
                text("B"),
                TokenKind::IfClose
            ]
        );
    }

    #[test]
    fn test_each() {
        assert_eq!(
            kinds("{{#each items}}{{name}}{{/each}}"),
            vec![
                TokenKind::EachOpen("items".into()),
                TokenKind::Variable("name".into()),
                TokenKind::EachClose
            ]
        );
    }

    #[test]
    fn test_block_and_extends_quotes() {
        assert_eq!(
            kinds(r#"{{extends "base"}}{{#block 'content'}}{{/block}}"#),
            vec![
                TokenKind::Extends("base".into()),
                TokenKind::BlockOpen("content".into()),
                TokenKind::BlockClose
            ]
        );
    }

    #[test]
    fn test_block_id_with_spaces_quoted() {
        assert_eq!(
            kinds(r#"{{#block "page header"}}"#),
            vec![TokenKind::BlockOpen("page header".into())]
        );
    }

    #[test]
    fn test_image() {
        assert_eq!(
            kinds("Logo: {{#image logo}}"),
            vec![text("Logo: "), TokenKind::Image("logo".into())]
        );
    }

    #[test]
    fn test_spans() {
        let tokens = tokenize("ab{{x}}c", false).unwrap();
        assert_eq!(tokens[0].start, 0);
        assert_eq!(tokens[0].end, 2);
        assert_eq!(tokens[1].start, 2);
        assert_eq!(tokens[1].end, 7);
        assert_eq!(tokens[2].start, 7);
    }

    #[test]
    fn test_unterminated_is_text() {
        assert_eq!(kinds("a {{name"), vec![text("a {{name")]);
    }

    #[test]
    fn test_nested_open_is_text() {
        assert_eq!(
            kinds("{{ a {{b}}"),
            vec![text("{{ a "), TokenKind::Variable("b".into())]
        );
    }

    #[test]
    fn test_unknown_directive_is_text() {
        assert_eq!(
            kinds("x {{#unless y}} z"),
            vec![text("x {{#unless y}} z")]
        );
        assert_eq!(kinds("{{a b}}"), vec![text("{{a b}}")]);
    }

    #[test]
    fn test_unknown_directive_strict() {
        let err = tokenize("x {{#unless y}}", true).unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::UnknownDirective("{{#unless y}}".into())
        );
        assert_eq!(err.position.offset, 2);
    }

    #[test]
    fn test_malformed_directive() {
        let err = tokenize("{{#if}}", false).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::MalformedDirective(_)));

        let err = tokenize("{{#each a b}}", false).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::MalformedDirective(_)));

        let err = tokenize(r#"{{extends ""}}"#, false).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::MalformedDirective(_)));
    }

    #[test]
    fn test_is_structural() {
        assert!(TokenKind::IfOpen("a".into()).is_structural());
        assert!(TokenKind::Extends("a".into()).is_structural());
        assert!(!TokenKind::Variable("a".into()).is_structural());
        assert!(!TokenKind::Image("a".into()).is_structural());
    }
}
