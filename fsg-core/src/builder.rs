use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::compositor::Compositor;
use crate::config::SiteConfig;
use crate::content::transform_post;
use crate::site::{Page, Post, Tag, Template, find_template};

#[derive(Debug)]
pub enum BuildError {
    MissingSourceDir(PathBuf),
    Io(std::io::Error),
}

impl From<std::io::Error> for BuildError {
    fn from(err: std::io::Error) -> Self {
        BuildError::Io(err)
    }
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::MissingSourceDir(p) => {
                write!(f, "source directory does not exist: {}", p.display())
            }
            BuildError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for BuildError {}

#[derive(Debug, Default)]
pub struct BuildSummary {
    pub posts: usize,
    pub pages: usize,
    pub tags: usize,
}

/// Run one full build: wipe the output tree, mirror asset directories,
/// load posts/templates/pages, and render everything.
///
/// Parse and I/O failures on individual files are logged and skip that
/// file only; the build itself only fails for environment-level problems.
pub fn build_site(
    config: &SiteConfig,
    source: &Path,
    output: &Path,
    include_drafts: bool,
) -> Result<BuildSummary, BuildError> {
    if !source.is_dir() {
        return Err(BuildError::MissingSourceDir(source.to_path_buf()));
    }

    // The previous output tree is discarded wholesale.
    let _ = fs::remove_dir_all(output);
    fs::create_dir_all(output)?;

    for dir in &config.assets {
        copy_tree(source, dir, output);
    }

    let posts_src = source.join(&config.posts_dir);
    let posts_dst = output.join("posts");

    // Posts: transform each file, collecting tag buckets in discovery
    // order as we go.
    let mut posts: Vec<Post> = Vec::new();
    let mut tags: Vec<Tag> = Vec::new();

    for path in list_files(&posts_src) {
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(src) = read_source(&path) else {
            continue;
        };

        let body = match transform_post(&src, &path.display().to_string()) {
            Ok(body) => body,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        let post = Post::from_body(filename, &posts_dst, body);
        for tag_name in &post.tags {
            match tags.iter_mut().find(|t| &t.name == tag_name) {
                Some(tag) => tag.posts.push(post.clone()),
                None => tags.push(Tag {
                    name: tag_name.clone(),
                    posts: vec![post.clone()],
                }),
            }
        }
        posts.push(post);
    }

    sort_posts(&mut posts);

    let mut templates: Vec<Template> = Vec::new();
    for path in list_files(&source.join(&config.templates_dir)) {
        let Some(name) = path.file_stem().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(src) = read_source(&path) else {
            continue;
        };

        match Template::parse(name.to_string(), src, &path.display().to_string()) {
            Ok(template) => templates.push(template),
            Err(e) => eprintln!("{e}"),
        }
    }

    let mut pages: Vec<Page> = Vec::new();
    for path in list_files(source) {
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(src) = read_source(&path) else {
            continue;
        };

        match Page::parse(
            filename.to_string(),
            output.join(filename),
            src,
            &path.display().to_string(),
        ) {
            Ok(page) => pages.push(page),
            Err(e) => eprintln!("{e}"),
        }
    }

    let compositor = Compositor::new(&templates, &posts, include_drafts);
    let mut summary = BuildSummary::default();

    if let Some(tag_template) = find_template(&templates, "posts_tag") {
        for tag in &tags {
            let html = compositor.render_tag(tag, tag_template);
            let path = output.join("posts/tag").join(format!("{}.html", tag.name));
            if write_file(&path, &html) {
                summary.tags += 1;
            }
        }
    }

    for page in &pages {
        if let Some(html) = compositor.render_page(page) {
            if write_file(&page.out_path, &html) {
                summary.pages += 1;
            }
        }
    }

    if let Some(post_template) = find_template(&templates, "post") {
        for post in &posts {
            if post.draft && !include_drafts {
                continue;
            }
            let mut html = String::new();
            compositor.render_post(&mut html, post_template, post);
            if write_file(&post.out_path, &html) {
                summary.posts += 1;
            }
        }
    }

    Ok(summary)
}

/// Descending by `created` (byte-wise), stable so discovery order breaks
/// ties.
pub(crate) fn sort_posts(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.created.cmp(&a.created));
}

/// Regular files directly inside `dir`. A missing or unreadable directory
/// yields nothing; the order is whatever the filesystem returns.
fn list_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect()
}

fn read_source(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(src) => Some(src),
        Err(e) => {
            eprintln!("failed reading {}: {}", path.display(), e);
            None
        }
    }
}

fn write_file(path: &Path, contents: &str) -> bool {
    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            eprintln!("failed creating {}: {}", parent.display(), e);
            return false;
        }
    }
    match fs::write(path, contents) {
        Ok(()) => true,
        Err(e) => {
            eprintln!("failed writing {}: {}", path.display(), e);
            false
        }
    }
}

/// Mirror `<source>/<dir>` into the output tree verbatim.
fn copy_tree(source: &Path, dir: &str, output: &Path) {
    let root = source.join(dir);
    if !root.is_dir() {
        return;
    }

    for entry in WalkDir::new(&root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
    {
        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        let dst = output.join(relative);
        if let Some(parent) = dst.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!("failed creating {}: {}", parent.display(), e);
                continue;
            }
        }
        if let Err(e) = fs::copy(entry.path(), &dst) {
            eprintln!(
                "failed copying {} to {}: {}",
                entry.path().display(),
                dst.display(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::transform_post;

    fn post(title: &str, created: &str) -> Post {
        let src = format!("<!--fsg: title \"{title}\"; created {created};-->x");
        let body = transform_post(&src, "test").unwrap();
        Post::from_body(&format!("{title}.html"), Path::new("out/posts"), body)
    }

    #[test]
    fn test_sort_is_descending_and_stable() {
        let mut posts = vec![
            post("P1", "2020-01-01"),
            post("P2", "2020-01-01"),
            post("P3", "2019-01-01"),
        ];
        sort_posts(&mut posts);
        let titles: Vec<&str> = posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["P1", "P2", "P3"]);
    }

    #[test]
    fn test_sort_moves_newest_first() {
        let mut posts = vec![post("Old", "2018-05-01"), post("New", "2021-02-03")];
        sort_posts(&mut posts);
        assert_eq!(posts[0].title, "New");
    }
}
