use std::fmt;

use crate::lexer::{Lexer, LexerFlags, Token, TokenKind};

#[derive(Debug)]
pub enum ParseError {
    UnexpectedToken {
        file: String,
        expected: String,
        got: String,
    },
    UnexpectedEof {
        file: String,
        expected: String,
    },
    UnknownDirective {
        file: String,
        keyword: String,
    },
    DuplicateDirective {
        file: String,
        keyword: &'static str,
    },
    InvalidBool {
        file: String,
        value: String,
    },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnexpectedToken {
                file,
                expected,
                got,
            } => write!(
                f,
                "parse error: {}: unexpected token. expected {}, got '{}'",
                file, expected, got
            ),
            ParseError::UnexpectedEof { file, expected } => {
                write!(f, "parse error: {}: unexpected EOF. expected {}", file, expected)
            }
            ParseError::UnknownDirective { file, keyword } => {
                write!(f, "parse error: {}: unknown directive '{}'", file, keyword)
            }
            ParseError::DuplicateDirective { file, keyword } => {
                write!(f, "parse error: {}: duplicate '{}' directive", file, keyword)
            }
            ParseError::InvalidBool { file, value } => {
                write!(f, "parse error: {}: expected bool, got '{}'", file, value)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// A single `key value;` statement from an `fsg:` comment.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Section(String),
    Template { template: String, section: String },
    Title(String),
    Subtitle(String),
    Created(String),
    Draft(bool),
    Tags(Vec<String>),
    Brief,
}

/// Which keywords a directive block accepts depends on the kind of file
/// the comment was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveContext {
    Template,
    Page,
    Post,
}

impl DirectiveContext {
    fn accepts(&self, keyword: &str) -> bool {
        match self {
            DirectiveContext::Template => matches!(keyword, "section"),
            DirectiveContext::Page => {
                matches!(keyword, "template" | "section" | "title" | "subtitle")
            }
            DirectiveContext::Post => {
                matches!(keyword, "title" | "created" | "draft" | "tags" | "brief")
            }
        }
    }
}

/// Parse the body of one comment token as a directive block.
///
/// Comments that do not open with `fsg` are not directive blocks; they
/// yield an empty list (the comment still delimits a section and is
/// excised from output).
pub fn parse_block(
    src: &str,
    comment: &Token,
    file: &str,
    ctx: DirectiveContext,
) -> Result<Vec<Directive>, ParseError> {
    let mut lexer = Lexer::slice(src, comment.range(), file, LexerFlags::DIRECTIVE);

    let t = lexer.next();
    if !is_identifier(&lexer, &t, "fsg") {
        return Ok(Vec::new());
    }
    expect_byte(&mut lexer, b':')?;

    let mut directives = Vec::new();
    let mut t = lexer.next();
    while t.kind != TokenKind::Eof {
        if t.kind != TokenKind::Identifier {
            return Err(unexpected(&lexer, &t, "identifier"));
        }

        let keyword = lexer.text(&t);
        if !ctx.accepts(keyword) || (keyword == "brief" && !directives.is_empty()) {
            return Err(ParseError::UnknownDirective {
                file: file.to_string(),
                keyword: keyword.to_string(),
            });
        }

        match keyword {
            "section" => {
                let value = parse_string(&mut lexer)?;
                expect_byte(&mut lexer, b';')?;
                directives.push(Directive::Section(value));
            }
            "template" => {
                let template = expect(&mut lexer, TokenKind::Identifier)?;
                let template = lexer.text(&template).to_string();
                expect_byte(&mut lexer, b'.')?;
                let section = expect(&mut lexer, TokenKind::Identifier)?;
                let section = lexer.text(&section).to_string();
                expect_byte(&mut lexer, b';')?;
                directives.push(Directive::Template { template, section });
            }
            "title" => {
                let value = parse_string(&mut lexer)?;
                expect_byte(&mut lexer, b';')?;
                directives.push(Directive::Title(value));
            }
            "subtitle" => {
                let value = parse_string(&mut lexer)?;
                expect_byte(&mut lexer, b';')?;
                directives.push(Directive::Subtitle(value));
            }
            "created" => {
                let value = parse_string(&mut lexer)?;
                expect_byte(&mut lexer, b';')?;
                directives.push(Directive::Created(value));
            }
            "draft" => {
                let value = parse_bool(&mut lexer)?;
                expect_byte(&mut lexer, b';')?;
                directives.push(Directive::Draft(value));
            }
            "tags" => {
                let values = parse_string_list(&mut lexer)?;
                expect_byte(&mut lexer, b';')?;
                directives.push(Directive::Tags(values));
            }
            "brief" => {
                // brief is a bare marker and must be the block's only
                // directive.
                expect_byte(&mut lexer, b';')?;
                expect(&mut lexer, TokenKind::Eof)?;
                directives.push(Directive::Brief);
                return Ok(directives);
            }
            _ => unreachable!("keyword gated by DirectiveContext::accepts"),
        }

        t = lexer.next();
    }

    Ok(directives)
}

pub fn is_identifier(lexer: &Lexer<'_>, t: &Token, text: &str) -> bool {
    t.kind == TokenKind::Identifier && lexer.text(t) == text
}

fn unexpected(lexer: &Lexer<'_>, t: &Token, expected: &str) -> ParseError {
    let got = if t.kind == TokenKind::Eof {
        "EOF".to_string()
    } else {
        lexer.text(t).to_string()
    };
    ParseError::UnexpectedToken {
        file: lexer.name().to_string(),
        expected: expected.to_string(),
        got,
    }
}

fn expect(lexer: &mut Lexer<'_>, kind: TokenKind) -> Result<Token, ParseError> {
    let t = lexer.next();
    if t.kind != kind {
        return Err(unexpected(lexer, &t, &kind.to_string()));
    }
    Ok(t)
}

fn expect_byte(lexer: &mut Lexer<'_>, b: u8) -> Result<Token, ParseError> {
    expect(lexer, TokenKind::Byte(b))
}

/// Scan raw tokens (nothing eaten) until a `b` literal is found, returning
/// that token. Hitting EOF first is an error.
fn eat_until_byte(lexer: &mut Lexer<'_>, b: u8) -> Result<Token, ParseError> {
    loop {
        let t = lexer.next_with(LexerFlags::NONE);
        match t.kind {
            TokenKind::Byte(found) if found == b => return Ok(t),
            TokenKind::Eof => {
                return Err(ParseError::UnexpectedEof {
                    file: lexer.name().to_string(),
                    expected: format!("'{}'", b as char),
                });
            }
            _ => {}
        }
    }
}

/// Parse a directive value.
///
/// Quoted values capture raw bytes up to the closing quote; a value that is
/// immediately `;` is empty; anything else is an opaque run of raw bytes up
/// to (not including) the terminating `;`, preserving internal punctuation
/// and spacing verbatim. The terminator itself is left for the caller.
fn parse_string(lexer: &mut Lexer<'_>) -> Result<String, ParseError> {
    let t = lexer.peek();
    match t.kind {
        TokenKind::Byte(b'"') => {
            let open = lexer.next();
            let close = eat_until_byte(lexer, b'"')?;
            let span = Token {
                kind: TokenKind::Identifier,
                start: open.start + 1,
                len: close.start - open.start - 1,
            };
            Ok(lexer.text(&span).to_string())
        }
        TokenKind::Byte(b';') => Ok(String::new()),
        _ => {
            let first = lexer.next();
            let end;
            loop {
                let t = lexer.peek();
                match t.kind {
                    TokenKind::Byte(b';') | TokenKind::Eof => {
                        end = t.start;
                        break;
                    }
                    _ => {
                        lexer.next();
                    }
                }
            }
            let span = Token {
                kind: TokenKind::Identifier,
                start: first.start,
                len: end - first.start,
            };
            Ok(lexer.text(&span).to_string())
        }
    }
}

/// Parse a comma-separated list of string values terminated by `;`.
fn parse_string_list(lexer: &mut Lexer<'_>) -> Result<Vec<String>, ParseError> {
    let mut values = Vec::new();

    loop {
        let t = lexer.peek();
        match t.kind {
            TokenKind::Byte(b';') => return Ok(values),
            TokenKind::Byte(b',') => {
                lexer.next();
            }
            TokenKind::Byte(b'"') => {
                let open = lexer.next();
                let close = eat_until_byte(lexer, b'"')?;
                let span = Token {
                    kind: TokenKind::Identifier,
                    start: open.start + 1,
                    len: close.start - open.start - 1,
                };
                values.push(lexer.text(&span).to_string());
            }
            TokenKind::Eof => {
                return Err(ParseError::UnexpectedEof {
                    file: lexer.name().to_string(),
                    expected: "';'".to_string(),
                });
            }
            _ => {
                let first = lexer.next();
                let end;
                loop {
                    let t = lexer.peek();
                    match t.kind {
                        TokenKind::Byte(b';') | TokenKind::Byte(b',') | TokenKind::Eof => {
                            end = t.start;
                            break;
                        }
                        _ => {
                            lexer.next();
                        }
                    }
                }
                let span = Token {
                    kind: TokenKind::Identifier,
                    start: first.start,
                    len: end - first.start,
                };
                values.push(lexer.text(&span).to_string());
            }
        }
    }
}

fn parse_bool(lexer: &mut Lexer<'_>) -> Result<bool, ParseError> {
    let value = parse_string(lexer)?;
    match value.as_str() {
        "yes" | "true" => Ok(true),
        "no" | "false" => Ok(false),
        _ => Err(ParseError::InvalidBool {
            file: lexer.name().to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment_token(src: &str) -> Token {
        let mut lexer = Lexer::with_flags(src, "test", LexerFlags::NONE);
        loop {
            let t = lexer.next();
            match t.kind {
                TokenKind::Comment => return t,
                TokenKind::Eof => panic!("no comment in {src:?}"),
                _ => {}
            }
        }
    }

    fn parse(src: &str, ctx: DirectiveContext) -> Result<Vec<Directive>, ParseError> {
        let t = comment_token(src);
        parse_block(src, &t, "test", ctx)
    }

    #[test]
    fn test_non_fsg_comment_is_not_a_block() {
        let directives = parse("<!-- just a note -->", DirectiveContext::Template).unwrap();
        assert!(directives.is_empty());
    }

    #[test]
    fn test_quoted_section_value() {
        let directives = parse("<!--fsg: section \"main\";-->", DirectiveContext::Template).unwrap();
        assert_eq!(directives, vec![Directive::Section("main".into())]);
    }

    #[test]
    fn test_empty_string_value() {
        let directives = parse("<!--fsg: section;-->", DirectiveContext::Template).unwrap();
        assert_eq!(directives, vec![Directive::Section(String::new())]);
    }

    #[test]
    fn test_bare_string_preserves_punctuation() {
        let directives = parse(
            "<!--fsg: title Hello, world: a post!;-->",
            DirectiveContext::Post,
        )
        .unwrap();
        assert_eq!(
            directives,
            vec![Directive::Title("Hello, world: a post!".into())]
        );
    }

    #[test]
    fn test_template_directive() {
        let directives = parse(
            "<!--fsg: template index.content;-->",
            DirectiveContext::Page,
        )
        .unwrap();
        assert_eq!(
            directives,
            vec![Directive::Template {
                template: "index".into(),
                section: "content".into(),
            }]
        );
    }

    #[test]
    fn test_tag_list_mixed_quoting() {
        let directives = parse(
            "<!--fsg: tags \"systems programming\", rust, c;-->",
            DirectiveContext::Post,
        )
        .unwrap();
        assert_eq!(
            directives,
            vec![Directive::Tags(vec![
                "systems programming".into(),
                "rust".into(),
                "c".into(),
            ])]
        );
    }

    #[test]
    fn test_unterminated_tag_list_is_error() {
        let err = parse("<!--fsg: tags a, b-->", DirectiveContext::Post).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEof { .. }));
    }

    #[test]
    fn test_bool_values() {
        for (text, expected) in [("yes", true), ("true", true), ("no", false), ("false", false)] {
            let src = format!("<!--fsg: draft {text};-->");
            let directives = parse(&src, DirectiveContext::Post).unwrap();
            assert_eq!(directives, vec![Directive::Draft(expected)]);
        }
    }

    #[test]
    fn test_invalid_bool_is_error() {
        let err = parse("<!--fsg: draft maybe;-->", DirectiveContext::Post).unwrap_err();
        assert!(matches!(err, ParseError::InvalidBool { .. }));
    }

    #[test]
    fn test_keyword_rejected_outside_its_context() {
        let err = parse("<!--fsg: title \"x\";-->", DirectiveContext::Template).unwrap_err();
        assert!(matches!(err, ParseError::UnknownDirective { .. }));
    }

    #[test]
    fn test_misspelled_keyword_is_error() {
        let err = parse("<!--fsg: sectoin \"x\";-->", DirectiveContext::Template).unwrap_err();
        assert!(matches!(err, ParseError::UnknownDirective { .. }));
    }

    #[test]
    fn test_brief_must_be_sole_directive() {
        let directives = parse("<!--fsg: brief;-->", DirectiveContext::Post).unwrap();
        assert_eq!(directives, vec![Directive::Brief]);

        let err = parse("<!--fsg: title \"x\"; brief;-->", DirectiveContext::Post).unwrap_err();
        assert!(matches!(err, ParseError::UnknownDirective { .. }));

        let err = parse("<!--fsg: brief; title \"x\";-->", DirectiveContext::Post).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { .. }));
    }

    #[test]
    fn test_multiple_directives_in_one_block() {
        let directives = parse(
            "<!--fsg:\n    title \"A post\";\n    created 2021-03-01;\n    tags a, b;\n-->",
            DirectiveContext::Post,
        )
        .unwrap();
        assert_eq!(directives.len(), 3);
        assert_eq!(directives[1], Directive::Created("2021-03-01".into()));
    }
}
