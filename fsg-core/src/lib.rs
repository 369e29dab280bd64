pub mod builder;
pub mod compositor;
pub mod config;
pub mod content;
pub mod directive;
pub mod lexer;
pub mod section;
pub mod site;

// Re-export main types
pub use builder::{BuildError, BuildSummary, build_site};
pub use compositor::Compositor;
pub use directive::ParseError;
pub use site::{Page, Post, Tag, Template};
