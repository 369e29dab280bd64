use std::path::PathBuf;

use crate::content::PostBody;
use crate::directive::{DirectiveContext, ParseError};
use crate::section::{Section, scan_sections};

/// A template file: named by its file stem, split into sections at its
/// directive comments.
#[derive(Debug)]
pub struct Template {
    pub name: String,
    pub source: String,
    pub sections: Vec<Section>,
}

impl Template {
    pub fn parse(name: String, source: String, file: &str) -> Result<Template, ParseError> {
        let scan = scan_sections(&source, file, DirectiveContext::Template)?;
        Ok(Template {
            name,
            source,
            sections: scan.sections,
        })
    }
}

pub fn find_template<'a>(templates: &'a [Template], name: &str) -> Option<&'a Template> {
    templates.iter().find(|t| t.name == name)
}

/// A page file: its own sections get spliced into the named section of its
/// chosen template.
#[derive(Debug)]
pub struct Page {
    pub name: String,
    pub out_path: PathBuf,
    pub title: String,
    pub subtitle: String,
    pub source: String,
    pub sections: Vec<Section>,
    pub template: Option<String>,
    pub dst_section: Option<String>,
}

impl Page {
    pub fn parse(
        name: String,
        out_path: PathBuf,
        source: String,
        file: &str,
    ) -> Result<Page, ParseError> {
        let scan = scan_sections(&source, file, DirectiveContext::Page)?;
        let (template, dst_section) = match scan.template {
            Some((template, section)) => (Some(template), Some(section)),
            None => (None, None),
        };
        Ok(Page {
            name,
            out_path,
            title: scan.title,
            subtitle: scan.subtitle,
            source,
            sections: scan.sections,
            template,
            dst_section,
        })
    }
}

/// A transformed post. `Clone` because tag buckets hold copies taken in
/// discovery order, before the post collection is date-sorted.
#[derive(Debug, Clone)]
pub struct Post {
    pub out_path: PathBuf,
    pub url: String,
    pub title: String,
    pub created: String,
    pub draft: bool,
    pub tags: Vec<String>,
    pub brief: String,
    pub content: String,
}

impl Post {
    pub fn from_body(filename: &str, posts_dst: &std::path::Path, body: PostBody) -> Post {
        let content = body.content;
        let brief = body.brief.unwrap_or_else(|| content.clone());
        Post {
            out_path: posts_dst.join(filename),
            url: join_url("/posts", filename),
            title: body.meta.title,
            created: body.meta.created,
            draft: body.meta.draft,
            tags: body.meta.tags,
            brief,
            content,
        }
    }
}

/// Posts sharing one tag, in discovery order.
#[derive(Debug)]
pub struct Tag {
    pub name: String,
    pub posts: Vec<Post>,
}

/// Join two URL fragments with exactly one `/` between them.
pub fn join_url(lhs: &str, rhs: &str) -> String {
    if lhs.ends_with('/') || rhs.starts_with('/') {
        format!("{lhs}{rhs}")
    } else {
        format!("{lhs}/{rhs}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::transform_post;
    use std::path::Path;

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("/posts", "a.html"), "/posts/a.html");
        assert_eq!(join_url("/posts/", "a.html"), "/posts/a.html");
        assert_eq!(join_url("/posts", "/a.html"), "/posts/a.html");
    }

    #[test]
    fn test_post_paths_and_url() {
        let body = transform_post("x", "test").unwrap();
        let post = Post::from_body("a.html", Path::new("out/posts"), body);
        assert_eq!(post.out_path, Path::new("out/posts/a.html"));
        assert_eq!(post.url, "/posts/a.html");
    }

    #[test]
    fn test_brief_defaults_to_full_content() {
        let body = transform_post("no marker here", "test").unwrap();
        let post = Post::from_body("a.html", Path::new("out"), body);
        assert_eq!(post.brief, post.content);
    }

    #[test]
    fn test_page_without_template_directive() {
        let page = Page::parse(
            "plain.html".into(),
            PathBuf::from("out/plain.html"),
            "<p>static</p>".into(),
            "plain.html",
        )
        .unwrap();
        assert!(page.template.is_none());
        assert!(page.dst_section.is_none());
        assert_eq!(page.sections.len(), 1);
    }

    #[test]
    fn test_template_lookup() {
        let templates = vec![
            Template::parse("index".into(), "a".into(), "index.html").unwrap(),
            Template::parse("post".into(), "b".into(), "post.html").unwrap(),
        ];
        assert!(find_template(&templates, "post").is_some());
        assert!(find_template(&templates, "missing").is_none());
    }
}
