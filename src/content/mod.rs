//! Content module - front matter, markdown, typed records and the index

mod frontmatter;
mod index;
pub mod loader;
pub mod markdown;
mod models;

pub use frontmatter::FrontMatter;
pub use index::ContentIndex;
pub use markdown::MarkdownRenderer;
pub use models::{Article, Category, Page, Sponsor, Tapestry, TeamMember, Tier};
