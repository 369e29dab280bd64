use crate::section::{Section, SectionKind};
use crate::site::{Page, Post, Tag, Template, find_template};

/// Renders templates by emitting their sections in order: each section's
/// literal bytes, then whatever its name substitutes. Holds the loaded
/// templates, the active post collection and the draft switch for one
/// build pass.
pub struct Compositor<'a> {
    templates: &'a [Template],
    posts: &'a [Post],
    include_drafts: bool,
    brief_inline: Option<&'a Template>,
    brief_block: Option<&'a Template>,
    full_block: Option<&'a Template>,
}

impl<'a> Compositor<'a> {
    pub fn new(templates: &'a [Template], posts: &'a [Post], include_drafts: bool) -> Self {
        Self {
            templates,
            posts,
            include_drafts,
            brief_inline: find_template(templates, "post_brief_inline"),
            brief_block: find_template(templates, "post_brief_block"),
            full_block: find_template(templates, "post_full_block"),
        }
    }

    /// Render a page against its chosen template. Returns `None` (logged)
    /// when the page names no template or one that doesn't exist.
    pub fn render_page(&self, page: &Page) -> Option<String> {
        let Some(template_name) = page.template.as_deref() else {
            eprintln!("page '{}' has no template directive", page.name);
            return None;
        };
        let Some(template) = find_template(self.templates, template_name) else {
            eprintln!(
                "page '{}' references unknown template '{}'",
                page.name, template_name
            );
            return None;
        };

        let mut out = String::new();
        for section in &template.sections {
            out.push_str(section.text(&template.source));
            match &section.kind {
                SectionKind::Literal => {}
                SectionKind::PageTitle => out.push_str(&page.title),
                SectionKind::PageSubtitle => out.push_str(&page.subtitle),
                SectionKind::PostsBrief => {
                    self.render_listing(&mut out, self.brief_inline, self.posts);
                }
                SectionKind::PostsFull => {
                    self.render_listing(&mut out, self.full_block, self.posts);
                }
                SectionKind::Named(name) if Some(name.as_str()) == page.dst_section.as_deref() => {
                    // Splice the page's own sections into the template at
                    // its designated target.
                    for section in &page.sections {
                        out.push_str(section.text(&page.source));
                        self.render_page_section(&mut out, page, section);
                    }
                }
                kind => unhandled(kind, &template.name),
            }
        }
        Some(out)
    }

    fn render_page_section(&self, out: &mut String, page: &Page, section: &Section) {
        match &section.kind {
            SectionKind::Literal => {}
            SectionKind::PageTitle => out.push_str(&page.title),
            SectionKind::PageSubtitle => out.push_str(&page.subtitle),
            SectionKind::PostsBrief => self.render_listing(out, self.brief_inline, self.posts),
            SectionKind::PostsFull => self.render_listing(out, self.full_block, self.posts),
            kind => unhandled(kind, &page.name),
        }
    }

    /// Render a tag index page: the tag's own post bucket is the active
    /// collection, and `posts.brief` uses the block brief template.
    pub fn render_tag(&self, tag: &Tag, template: &Template) -> String {
        let mut out = String::new();
        for section in &template.sections {
            out.push_str(section.text(&template.source));
            match &section.kind {
                SectionKind::Literal => {}
                SectionKind::TagName => out.push_str(&tag.name),
                SectionKind::PostsBrief => {
                    self.render_listing(&mut out, self.brief_block, &tag.posts);
                }
                SectionKind::PostsFull => {
                    self.render_listing(&mut out, self.full_block, &tag.posts);
                }
                kind => unhandled(kind, &template.name),
            }
        }
        out
    }

    fn render_listing(&self, out: &mut String, template: Option<&Template>, posts: &[Post]) {
        // A missing listing template disables the listing.
        let Some(template) = template else { return };
        for post in posts {
            if post.draft && !self.include_drafts {
                continue;
            }
            self.render_post(out, template, post);
        }
    }

    /// Render one post through a fragment template.
    pub fn render_post(&self, out: &mut String, template: &Template, post: &Post) {
        for section in &template.sections {
            out.push_str(section.text(&template.source));
            match &section.kind {
                SectionKind::Literal => {}
                SectionKind::PostTitle => out.push_str(&post.title),
                SectionKind::PostCreated => out.push_str(&post.created),
                SectionKind::PostUrl => out.push_str(&post.url),
                SectionKind::PostBrief => out.push_str(&post.brief),
                SectionKind::PostContent => out.push_str(&post.content),
                SectionKind::PostTags => {
                    if !post.tags.is_empty() {
                        out.push_str("<i class=\"fa fa-tag\"></i>");
                        for (i, tag) in post.tags.iter().enumerate() {
                            if i > 0 {
                                out.push_str(", ");
                            }
                            out.push_str(&format!(
                                "<a href=\"/posts/tag/{tag}.html\">{tag}</a>"
                            ));
                        }
                    }
                }
                kind => unhandled(kind, &template.name),
            }
        }
    }
}

fn unhandled(kind: &SectionKind, owner: &str) {
    eprintln!("unhandled section '{}' in '{}'", kind.name(), owner);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::transform_post;
    use std::path::{Path, PathBuf};

    fn template(name: &str, source: &str) -> Template {
        Template::parse(name.into(), source.into(), name).unwrap()
    }

    fn post(title: &str, created: &str, draft: bool, tags: &[&str], body: &str) -> Post {
        let src = format!(
            "<!--fsg: title \"{title}\"; created {created}; draft {}; tags {};-->{body}",
            if draft { "yes" } else { "no" },
            tags.join(", "),
        );
        let body = transform_post(&src, "test").unwrap();
        Post::from_body(&format!("{title}.html"), Path::new("out/posts"), body)
    }

    fn page(source: &str) -> Page {
        Page::parse(
            "page.html".into(),
            PathBuf::from("out/page.html"),
            source.into(),
            "page.html",
        )
        .unwrap()
    }

    #[test]
    fn test_page_render_substitutes_titles_and_splices_content() {
        let templates = vec![template(
            "base",
            "<title><!--fsg: section \"page.title\";--></title>\
             <body><!--fsg: section \"content\";--></body>",
        )];
        let page = page(
            "<!--fsg: template base.content; title \"Home\";--><p>welcome</p>",
        );

        let compositor = Compositor::new(&templates, &[], false);
        let html = compositor.render_page(&page).unwrap();
        assert_eq!(html, "<title>Home</title><body><p>welcome</p></body>");
    }

    #[test]
    fn test_page_with_unresolved_template_is_skipped() {
        let templates: Vec<Template> = Vec::new();
        let page = page("<!--fsg: template missing.content;-->x");
        let compositor = Compositor::new(&templates, &[], false);
        assert!(compositor.render_page(&page).is_none());
    }

    #[test]
    fn test_unknown_section_leaves_literal_prefix() {
        let templates = vec![template(
            "base",
            "before<!--fsg: section \"no.such.field\";-->after\
             <!--fsg: section \"content\";-->",
        )];
        let page = page("<!--fsg: template base.content;-->");
        let compositor = Compositor::new(&templates, &[], false);
        let html = compositor.render_page(&page).unwrap();
        assert_eq!(html, "beforeafter");
    }

    #[test]
    fn test_post_fields_and_tag_links() {
        let templates = vec![template(
            "post",
            "<h1><!--fsg: section \"post.title\";--></h1>\
             <time><!--fsg: section \"post.created\";--></time>\
             <!--fsg: section \"post.tags\";-->\
             <div><!--fsg: section \"post.content\";--></div>",
        )];
        let p = post("First", "2020-01-01", false, &["a", "b"], "body");

        let compositor = Compositor::new(&templates, &[], false);
        let mut out = String::new();
        compositor.render_post(&mut out, &templates[0], &p);
        assert_eq!(
            out,
            "<h1>First</h1><time>2020-01-01</time>\
             <i class=\"fa fa-tag\"></i>\
             <a href=\"/posts/tag/a.html\">a</a>, <a href=\"/posts/tag/b.html\">b</a>\
             <div>body</div>"
        );
    }

    #[test]
    fn test_post_without_tags_emits_no_tag_icon() {
        let templates = vec![template("post", "<!--fsg: section \"post.tags\";-->")];
        let p = post("First", "2020-01-01", false, &[], "body");
        let compositor = Compositor::new(&templates, &[], false);
        let mut out = String::new();
        compositor.render_post(&mut out, &templates[0], &p);
        assert_eq!(out, "");
    }

    #[test]
    fn test_listing_skips_drafts_unless_enabled() {
        let templates = vec![
            template("base", "<!--fsg: section \"content\";-->"),
            template("post_brief_inline", "[<!--fsg: section \"post.title\";-->]"),
        ];
        let posts = vec![
            post("Visible", "2020-01-02", false, &[], "x"),
            post("Hidden", "2020-01-01", true, &[], "y"),
        ];
        let page = page("<!--fsg: template base.content; section \"posts.brief\";-->");

        let compositor = Compositor::new(&templates, &posts, false);
        assert_eq!(compositor.render_page(&page).unwrap(), "[Visible]");

        let compositor = Compositor::new(&templates, &posts, true);
        assert_eq!(compositor.render_page(&page).unwrap(), "[Visible][Hidden]");
    }

    #[test]
    fn test_missing_listing_template_disables_listing() {
        let templates = vec![template("base", "<!--fsg: section \"content\";-->")];
        let posts = vec![post("P", "2020-01-01", false, &[], "x")];
        let page = page("a<!--fsg: template base.content; section \"posts.brief\";-->b");
        let compositor = Compositor::new(&templates, &posts, false);
        assert_eq!(compositor.render_page(&page).unwrap(), "ab");
    }

    #[test]
    fn test_tag_page_uses_bucket_and_block_template() {
        let templates = vec![
            template(
                "posts_tag",
                "<h1><!--fsg: section \"tag.str\";--></h1><!--fsg: section \"posts.brief\";-->",
            ),
            template("post_brief_block", "(<!--fsg: section \"post.title\";-->)"),
        ];
        let tag = Tag {
            name: "rust".into(),
            posts: vec![
                post("One", "2020-01-01", false, &["rust"], "x"),
                post("Two", "2020-01-02", false, &["rust"], "y"),
            ],
        };

        let compositor = Compositor::new(&templates, &[], false);
        let html = compositor.render_tag(&tag, find_template(&templates, "posts_tag").unwrap());
        assert_eq!(html, "<h1>rust</h1>(One)(Two)");
    }
}
