use crate::directive::{Directive, DirectiveContext, ParseError, parse_block};
use crate::lexer::{Lexer, TokenKind};

/// Substitution role of a section, resolved once at extraction time so the
/// compositor dispatches on an enum instead of re-comparing strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionKind {
    /// Empty name: literal passthrough only.
    Literal,
    PageTitle,
    PageSubtitle,
    PostTitle,
    PostCreated,
    PostUrl,
    PostBrief,
    PostContent,
    PostTags,
    PostsBrief,
    PostsFull,
    TagName,
    /// Any other name. May match a page's target section; otherwise it is
    /// reported as unhandled at render time.
    Named(String),
}

impl SectionKind {
    pub fn resolve(name: &str) -> SectionKind {
        match name {
            "" => SectionKind::Literal,
            "page.title" => SectionKind::PageTitle,
            "page.subtitle" => SectionKind::PageSubtitle,
            "post.title" => SectionKind::PostTitle,
            "post.created" => SectionKind::PostCreated,
            "post.url" => SectionKind::PostUrl,
            "post.brief" => SectionKind::PostBrief,
            "post.content" => SectionKind::PostContent,
            "post.tags" => SectionKind::PostTags,
            "posts.brief" => SectionKind::PostsBrief,
            "posts.full" => SectionKind::PostsFull,
            "tag.str" => SectionKind::TagName,
            _ => SectionKind::Named(name.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SectionKind::Literal => "",
            SectionKind::PageTitle => "page.title",
            SectionKind::PageSubtitle => "page.subtitle",
            SectionKind::PostTitle => "post.title",
            SectionKind::PostCreated => "post.created",
            SectionKind::PostUrl => "post.url",
            SectionKind::PostBrief => "post.brief",
            SectionKind::PostContent => "post.content",
            SectionKind::PostTags => "post.tags",
            SectionKind::PostsBrief => "posts.brief",
            SectionKind::PostsFull => "posts.full",
            SectionKind::TagName => "tag.str",
            SectionKind::Named(name) => name,
        }
    }
}

/// A literal byte range of a template or page, delimited by directive
/// comments. The range never duplicates the underlying bytes; rendering
/// slices the entity's own source buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub kind: SectionKind,
    pub offset: usize,
    pub len: usize,
}

impl Section {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.offset..self.offset + self.len]
    }
}

/// Result of scanning one template or page file.
#[derive(Debug, Default)]
pub struct Scan {
    pub sections: Vec<Section>,
    pub title: String,
    pub subtitle: String,
    /// `template name.section` reference, for pages.
    pub template: Option<(String, String)>,
}

/// Split a source buffer into sections at its comments.
///
/// Every comment delimits a section covering the literal content since the
/// previous comment; the section is named by the last `section` directive
/// inside the comment, if any. Comment bytes belong to no section, so
/// directive comments never appear in rendered output. Content after the
/// last comment becomes an unnamed tail section.
pub fn scan_sections(src: &str, file: &str, ctx: DirectiveContext) -> Result<Scan, ParseError> {
    let mut scan = Scan::default();
    let mut lexer = Lexer::new(src, file);
    let mut last_end = 0;

    loop {
        let t = lexer.next();
        match t.kind {
            TokenKind::Eof => break,
            TokenKind::Comment => {
                let outer_start = t.start - 4;
                let outer_end = (t.start + t.len + 3).min(src.len());

                let mut name = String::new();
                for directive in parse_block(src, &t, file, ctx)? {
                    match directive {
                        // Last section directive in a comment wins.
                        Directive::Section(value) => name = value,
                        Directive::Template { template, section } => {
                            if scan.template.is_some() {
                                return Err(ParseError::DuplicateDirective {
                                    file: file.to_string(),
                                    keyword: "template",
                                });
                            }
                            scan.template = Some((template, section));
                        }
                        Directive::Title(value) => scan.title = value,
                        Directive::Subtitle(value) => scan.subtitle = value,
                        _ => {}
                    }
                }

                scan.sections.push(Section {
                    kind: SectionKind::resolve(&name),
                    offset: last_end,
                    len: outer_start - last_end,
                });
                last_end = outer_end;
            }
            _ => {}
        }
    }

    if src.len() > last_end {
        scan.sections.push(Section {
            kind: SectionKind::Literal,
            offset: last_end,
            len: src.len() - last_end,
        });
    }

    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_comments_yields_single_tail_section() {
        let src = "<html><body>hello</body></html>";
        let scan = scan_sections(src, "test", DirectiveContext::Template).unwrap();
        assert_eq!(
            scan.sections,
            vec![Section {
                kind: SectionKind::Literal,
                offset: 0,
                len: src.len(),
            }]
        );
    }

    #[test]
    fn test_empty_file_yields_no_sections() {
        let scan = scan_sections("", "test", DirectiveContext::Template).unwrap();
        assert!(scan.sections.is_empty());
    }

    #[test]
    fn test_comment_delimits_named_and_tail_section() {
        let src = "X<!--fsg: section \"A\";-->Y";
        let scan = scan_sections(src, "test", DirectiveContext::Template).unwrap();
        assert_eq!(scan.sections.len(), 2);
        assert_eq!(scan.sections[0].kind, SectionKind::Named("A".into()));
        assert_eq!(scan.sections[0].text(src), "X");
        assert_eq!(scan.sections[1].kind, SectionKind::Literal);
        assert_eq!(scan.sections[1].text(src), "Y");
    }

    #[test]
    fn test_comment_bytes_are_excised() {
        let src = "a<!-- plain note -->b";
        let scan = scan_sections(src, "test", DirectiveContext::Template).unwrap();
        let rendered: String = scan.sections.iter().map(|s| s.text(src)).collect();
        assert_eq!(rendered, "ab");
    }

    #[test]
    fn test_last_section_directive_wins() {
        let src = "X<!--fsg: section \"first\"; section \"second\";-->";
        let scan = scan_sections(src, "test", DirectiveContext::Template).unwrap();
        assert_eq!(scan.sections[0].kind, SectionKind::Named("second".into()));
    }

    #[test]
    fn test_known_field_names_resolve() {
        let src = "<!--fsg: section \"post.title\";--><!--fsg: section \"posts.brief\";-->";
        let scan = scan_sections(src, "test", DirectiveContext::Template).unwrap();
        assert_eq!(scan.sections[0].kind, SectionKind::PostTitle);
        assert_eq!(scan.sections[1].kind, SectionKind::PostsBrief);
    }

    #[test]
    fn test_page_scan_collects_template_and_titles() {
        let src = "<!--fsg:\n template index.content;\n title \"Home\";\n subtitle \"sub\";\n-->body";
        let scan = scan_sections(src, "test", DirectiveContext::Page).unwrap();
        assert_eq!(scan.template, Some(("index".into(), "content".into())));
        assert_eq!(scan.title, "Home");
        assert_eq!(scan.subtitle, "sub");
        assert_eq!(scan.sections.len(), 2);
        assert_eq!(scan.sections[1].text(src), "body");
    }

    #[test]
    fn test_duplicate_template_directive_is_error() {
        let src = "<!--fsg: template a.x;--><!--fsg: template b.y;-->";
        let err = scan_sections(src, "test", DirectiveContext::Page).unwrap_err();
        assert!(matches!(err, ParseError::DuplicateDirective { .. }));
    }

    #[test]
    fn test_sections_cover_everything_but_comments() {
        let src = "aaa<!--fsg: section \"x\";-->bbb<!-- note -->ccc";
        let scan = scan_sections(src, "test", DirectiveContext::Template).unwrap();
        let rendered: String = scan.sections.iter().map(|s| s.text(src)).collect();
        assert_eq!(rendered, "aaabbbccc");
        assert_eq!(scan.sections.len(), 3);
    }
}
