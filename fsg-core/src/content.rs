use crate::directive::{Directive, DirectiveContext, ParseError, parse_block};
use crate::lexer::{Lexer, LexerFlags, TokenKind};

/// Front matter collected from a post's `fsg:` comments.
#[derive(Debug, Default, Clone)]
pub struct PostMeta {
    pub title: String,
    pub created: String,
    pub draft: bool,
    pub tags: Vec<String>,
}

/// A post file after transformation: rendered HTML content plus the brief
/// snapshot, if the body carried a `brief;` marker.
#[derive(Debug)]
pub struct PostBody {
    pub meta: PostMeta,
    pub brief: Option<String>,
    pub content: String,
}

/// An attribute parsed out of an HTML start tag. Both halves borrow the
/// tag's bytes; a valueless attribute has an empty value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TagProperty<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

/// Transform a post file's raw bytes into rendered HTML.
///
/// Directive comments are excised (and mined for front matter or the
/// `brief;` marker), code fences become `<code>` elements with escaped
/// bodies, anchors are re-emitted normalized, and everything else passes
/// through verbatim.
pub fn transform_post(src: &str, file: &str) -> Result<PostBody, ParseError> {
    let mut lexer = Lexer::with_flags(src, file, LexerFlags::POST);

    let mut meta = PostMeta::default();
    let mut brief = None;
    let mut content = String::new();
    let mut cursor = 0;

    loop {
        let t = lexer.next();
        match t.kind {
            TokenKind::Eof => break,
            TokenKind::Comment => {
                for directive in parse_block(src, &t, file, DirectiveContext::Post)? {
                    match directive {
                        // Everything rendered so far becomes the brief;
                        // accumulation continues for the full content.
                        Directive::Brief => brief = Some(content.clone()),
                        Directive::Title(value) => meta.title = value,
                        Directive::Created(value) => meta.created = value,
                        Directive::Draft(value) => meta.draft = value,
                        Directive::Tags(values) => meta.tags = values,
                        _ => {}
                    }
                }
            }
            TokenKind::CodeBlock => {
                content.push_str("<code class=\"block\">");
                escape_html(&mut content, lexer.text(&t));
                content.push_str("</code>");
            }
            TokenKind::CodeInline => {
                content.push_str("<code>");
                escape_html(&mut content, lexer.text(&t));
                content.push_str("</code>");
            }
            TokenKind::Anchor => {
                let tag = lexer.text(&t);
                let inner = parse_tag_inner(tag);

                content.push_str("<a");
                let mut has_href = false;
                for property in parse_tag_properties(tag) {
                    if property.key == "href" {
                        has_href = true;
                    }
                    content.push_str(&format!(" {}=\"{}\"", property.key, property.value));
                }
                if !has_href {
                    content.push_str(&format!(" href=\"{inner}\""));
                }
                content.push_str(&format!(">{inner}</a>"));
            }
            _ => {
                // Whitespace, newlines, identifiers and literals pass
                // through unchanged.
                content.push_str(&src[cursor..lexer.pos()]);
            }
        }
        cursor = lexer.pos();
    }

    Ok(PostBody {
        meta,
        brief,
        content,
    })
}

/// Append `text` with `<` and `>` substituted. Nothing else is escaped.
pub fn escape_html(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

/// Parse the space-delimited `key` / `key="value"` attributes of an HTML
/// start tag.
pub fn parse_tag_properties(tag: &str) -> Vec<TagProperty<'_>> {
    let bytes = tag.as_bytes();
    let mut properties = Vec::new();

    // Skip the tag name.
    let mut at = 1;
    while at < bytes.len() && !matches!(bytes[at], b' ' | b'>') {
        at += 1;
    }
    if at >= bytes.len() || bytes[at] == b'>' {
        return properties;
    }

    at += 1;
    while at < bytes.len() {
        while at < bytes.len() && bytes[at] == b' ' {
            at += 1;
        }
        if at >= bytes.len() || bytes[at] == b'>' {
            break;
        }
        if !bytes[at].is_ascii_alphabetic() {
            at += 1;
            continue;
        }

        let key_start = at;
        while at < bytes.len() && !matches!(bytes[at], b'>' | b'=' | b' ') {
            at += 1;
        }
        let key = &tag[key_start..at];

        let mut value = "";
        if at < bytes.len() && bytes[at] == b'=' {
            // '=' and the opening quote; the tag may end right after '='.
            at = (at + 2).min(bytes.len());
            let value_start = at;
            while at < bytes.len() && bytes[at] != b'"' {
                at += 1;
            }
            value = &tag[value_start..at];
            at += 1;
        }

        properties.push(TagProperty { key, value });
    }

    properties
}

/// The inner text of a tag: everything between the start tag's `>` and the
/// next `<`.
pub fn parse_tag_inner(tag: &str) -> &str {
    let bytes = tag.as_bytes();

    let mut at = 1;
    while at < bytes.len() && bytes[at] != b'>' {
        at += 1;
    }
    at += 1;

    let start = at.min(bytes.len());
    let mut end = start;
    while end < bytes.len() && bytes[end] != b'<' {
        end += 1;
    }
    &tag[start..end]
}
