//! Content loader - reads the content directory into typed records

use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset, Local};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{
    Article, Category, ContentIndex, FrontMatter, MarkdownRenderer, Page, Sponsor, Tapestry,
    TeamMember, Tier,
};
use crate::helpers::html_escape;
use crate::Site;

/// Collection directories under the content root
pub const NEWS_DIR: &str = "news";
pub const TEAM_DIR: &str = "team";
pub const SPONSORS_DIR: &str = "sponsors";
pub const TAPESTRIES_DIR: &str = "tapestries";
pub const PAGES_DIR: &str = "pages";

/// Markdown shown above the contact form
pub const CONTACT_FILE: &str = "contact.md";

/// Top-level URL segments owned by generated sections
const RESERVED_PAGE_SLUGS: &[&str] = &[
    "news",
    "team",
    "sponsors",
    "tapestries",
    "contact",
    "media",
    "api",
];

/// A parsed markdown file before it becomes a typed record
struct SourceFile {
    path: PathBuf,
    source: String,
    slug: String,
    front_matter: FrontMatter,
    body: String,
    modified: Option<DateTime<FixedOffset>>,
}

impl SourceFile {
    fn stem(&self) -> String {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("untitled")
            .to_string()
    }

    fn title(&self) -> String {
        self.front_matter.title.clone().unwrap_or_else(|| self.stem())
    }
}

/// Loads content from the content directory
pub struct ContentLoader<'a> {
    site: &'a Site,
    renderer: MarkdownRenderer,
}

impl<'a> ContentLoader<'a> {
    /// Create a new content loader
    pub fn new(site: &'a Site) -> Self {
        let renderer = MarkdownRenderer::for_site(&site.config);
        Self { site, renderer }
    }

    /// Load every collection and build the index
    pub fn load_all(&self) -> Result<ContentIndex> {
        let index = ContentIndex::new(
            self.load_articles()?,
            self.load_team()?,
            self.load_sponsors()?,
            self.load_tapestries()?,
            self.load_pages()?,
        )
        .with_contact_intro(self.load_contact_intro()?);
        tracing::info!(
            "Loaded {} articles, {} team members, {} sponsors, {} tapestries, {} pages",
            index.articles().len(),
            index.team().len(),
            index.sponsor_count(),
            index.tapestries().len(),
            index.pages().len()
        );
        Ok(index)
    }

    /// Load news and blog articles
    pub fn load_articles(&self) -> Result<Vec<Article>> {
        let now = self.site.config.now();
        let mut articles = Vec::new();

        for file in self.read_collection(NEWS_DIR)? {
            let path = file.path.clone();
            match self.build_article(file) {
                Ok(article) => {
                    if !article.published && !self.site.config.render_drafts {
                        tracing::debug!("Skipping draft {:?}", path);
                        continue;
                    }
                    if article.date > now && !self.site.config.future {
                        tracing::debug!("Skipping future-dated {:?}", path);
                        continue;
                    }
                    articles.push(article);
                }
                Err(e) => tracing::warn!("Failed to load article {:?}: {}", path, e),
            }
        }

        Ok(articles)
    }

    fn build_article(&self, file: SourceFile) -> Result<Article> {
        let fm = &file.front_matter;

        let category = match fm.category.as_deref() {
            Some(c) => c.parse::<Category>()?,
            None => Category::default(),
        };

        let tz = self.site.config.tz();
        let date = fm
            .parse_date(tz)
            .or(file.modified)
            .unwrap_or_else(|| self.site.config.now());
        let updated = fm.parse_updated(tz);

        let (excerpt_md, full_md) = MarkdownRenderer::split_excerpt(&file.body);
        let content = self.renderer.render(&full_md)?;
        let excerpt = match (excerpt_md, fm.excerpt.as_deref()) {
            (Some(md), _) => self.renderer.render(&md)?,
            (None, Some(text)) => self.renderer.render(text)?,
            (None, None) => {
                let text =
                    MarkdownRenderer::first_paragraph(&file.body, self.site.config.excerpt_length);
                if text.is_empty() {
                    String::new()
                } else {
                    format!("<p>{}</p>", html_escape(&text))
                }
            }
        };

        Ok(Article {
            title: file.title(),
            path: format!("/{}/{}/", NEWS_DIR, file.slug),
            slug: file.slug,
            date,
            updated,
            category,
            author: fm.author.clone(),
            tags: fm
                .tags
                .iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            featured: fm.featured,
            published: fm.published,
            image: fm.image.clone(),
            raw: file.body,
            content,
            excerpt,
            source: file.source,
            full_source: file.path,
            extra: file.front_matter.extra,
        })
    }

    /// Load team members
    pub fn load_team(&self) -> Result<Vec<TeamMember>> {
        let mut team = Vec::new();
        for file in self.read_collection(TEAM_DIR)? {
            if !self.is_visible(&file) {
                continue;
            }
            let bio = match self.renderer.render(&file.body) {
                Ok(html) => html,
                Err(e) => {
                    tracing::warn!("Failed to render team member {:?}: {}", file.path, e);
                    continue;
                }
            };
            team.push(TeamMember {
                name: file.title(),
                slug: file.slug,
                role: file.front_matter.role,
                image: file.front_matter.image,
                order: file.front_matter.order.unwrap_or(i64::MAX),
                links: file.front_matter.links,
                bio,
                source: file.source,
            });
        }
        Ok(team)
    }

    /// Load sponsors
    pub fn load_sponsors(&self) -> Result<Vec<Sponsor>> {
        let mut sponsors = Vec::new();
        for file in self.read_collection(SPONSORS_DIR)? {
            if !self.is_visible(&file) {
                continue;
            }
            let path = file.path.clone();
            match self.build_sponsor(file) {
                Ok(sponsor) => sponsors.push(sponsor),
                Err(e) => tracing::warn!("Failed to load sponsor {:?}: {}", path, e),
            }
        }
        Ok(sponsors)
    }

    fn build_sponsor(&self, file: SourceFile) -> Result<Sponsor> {
        let tier = match file.front_matter.tier.as_deref() {
            Some(t) => t.parse::<Tier>()?,
            None => Tier::default(),
        };
        Ok(Sponsor {
            name: file.title(),
            description: self.renderer.render(&file.body)?,
            slug: file.slug,
            tier,
            website: file.front_matter.website,
            logo: file.front_matter.logo.or(file.front_matter.image),
            order: file.front_matter.order.unwrap_or(i64::MAX),
            source: file.source,
        })
    }

    /// Load tapestries for the gallery
    pub fn load_tapestries(&self) -> Result<Vec<Tapestry>> {
        let mut tapestries = Vec::new();
        for file in self.read_collection(TAPESTRIES_DIR)? {
            if !self.is_visible(&file) {
                continue;
            }
            let path = file.path.clone();
            match self.build_tapestry(file) {
                Ok(tapestry) => tapestries.push(tapestry),
                Err(e) => tracing::warn!("Failed to load tapestry {:?}: {}", path, e),
            }
        }
        Ok(tapestries)
    }

    fn build_tapestry(&self, file: SourceFile) -> Result<Tapestry> {
        let fm = file.front_matter;
        let excerpt = match fm.excerpt.as_deref() {
            Some(text) => text.to_string(),
            None => MarkdownRenderer::first_paragraph(&file.body, self.site.config.excerpt_length),
        };
        let image = fm.image.or_else(|| fm.images.first().cloned());
        Ok(Tapestry {
            title: fm.title.unwrap_or_else(|| file.slug.clone()),
            path: format!("/{}/{}/", TAPESTRIES_DIR, file.slug),
            content: self.renderer.render(&file.body)?,
            slug: file.slug,
            year: fm.year,
            location: fm.location,
            dimensions: fm.dimensions,
            technique: fm.technique,
            image,
            images: fm.images,
            featured: fm.featured,
            order: fm.order.unwrap_or(i64::MAX),
            excerpt,
            source: file.source,
        })
    }

    /// Load standalone pages
    pub fn load_pages(&self) -> Result<Vec<Page>> {
        let mut pages = Vec::new();
        for file in self.read_collection(PAGES_DIR)? {
            if !self.is_visible(&file) {
                continue;
            }
            if RESERVED_PAGE_SLUGS.contains(&file.slug.as_str()) {
                tracing::warn!(
                    "Skipping page {:?}: slug {:?} is used by a generated section",
                    file.path,
                    file.slug
                );
                continue;
            }
            let content = match self.renderer.render(&file.body) {
                Ok(html) => html,
                Err(e) => {
                    tracing::warn!("Failed to render page {:?}: {}", file.path, e);
                    continue;
                }
            };
            pages.push(Page {
                title: file.title(),
                path: format!("/{}/", file.slug),
                updated: file
                    .front_matter
                    .parse_updated(self.site.config.tz())
                    .or(file.modified),
                slug: file.slug,
                content,
                source: file.source,
                extra: file.front_matter.extra,
            });
        }
        Ok(pages)
    }

    /// Rendered body of `contact.md` at the content root, if any
    pub fn load_contact_intro(&self) -> Result<Option<String>> {
        let path = self.site.content_dir.join(CONTACT_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let (_, body) = FrontMatter::parse(&raw)?;
        Ok(Some(self.renderer.render(body)?))
    }

    fn is_visible(&self, file: &SourceFile) -> bool {
        file.front_matter.published || self.site.config.render_drafts
    }

    /// Read and parse every markdown file of one collection.
    ///
    /// Unreadable files are logged and skipped; two files resolving to the
    /// same slug abort the load.
    fn read_collection(&self, name: &str) -> Result<Vec<SourceFile>> {
        let dir = self.site.content_dir.join(name);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        let mut seen: HashMap<String, String> = HashMap::new();

        for entry in WalkDir::new(&dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()))
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || !is_markdown_file(path) {
                continue;
            }

            let file = match self.read_file(path) {
                Ok(file) => file,
                Err(e) => {
                    tracing::warn!("Failed to read {:?}: {}", path, e);
                    continue;
                }
            };

            if file.slug.is_empty() {
                tracing::warn!("Skipping {:?}: empty slug", path);
                continue;
            }
            if let Some(other) = seen.insert(file.slug.clone(), file.source.clone()) {
                bail!(
                    "Duplicate slug {:?} in {}: {} and {}",
                    file.slug,
                    name,
                    other,
                    file.source
                );
            }
            files.push(file);
        }

        Ok(files)
    }

    fn read_file(&self, path: &Path) -> Result<SourceFile> {
        let raw = fs::read_to_string(path)?;
        let (front_matter, body) = FrontMatter::parse(&raw)?;
        let body = body.to_string();

        let modified = fs::metadata(path)?
            .modified()
            .ok()
            .map(|t| DateTime::<Local>::from(t).fixed_offset());

        let source = path
            .strip_prefix(&self.site.content_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("untitled");
        let slug = slug::slugify(front_matter.slug.as_deref().unwrap_or(stem));

        Ok(SourceFile {
            path: path.to_path_buf(),
            source,
            slug,
            front_matter,
            body,
            modified,
        })
    }
}

/// Check if a file is a markdown file
fn is_markdown_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "md" || e == "markdown")
        .unwrap_or(false)
}

/// Drafts and partials start with `_`, editor/OS files with `.`
fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('_') || n.starts_with('.'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn site_in(dir: &TempDir) -> Site {
        Site::with_config(dir.path(), SiteConfig::default())
    }

    #[test]
    fn test_load_articles_with_slug_and_category() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "content/news/2024-spring-open-day.md",
            "---\ntitle: Spring Open Day\ndate: 2024-04-01\ncategory: Events\nslug: Open Day\n---\nCome and see the looms.\n",
        );
        write(
            tmp.path(),
            "content/news/first-stitch.md",
            "---\ntitle: First Stitch\ndate: 2023-09-10\n---\nIntro\n<!-- more -->\nRest",
        );

        let site = site_in(&tmp);
        let loader = ContentLoader::new(&site);
        let articles = loader.load_articles().unwrap();
        assert_eq!(articles.len(), 2);

        let open_day = articles.iter().find(|a| a.slug == "open-day").unwrap();
        assert_eq!(open_day.category, Category::Events);
        assert_eq!(open_day.path, "/news/open-day/");
        assert_eq!(open_day.source, "news/2024-spring-open-day.md");
        assert_eq!(open_day.excerpt, "<p>Come and see the looms.</p>");

        let first = articles.iter().find(|a| a.slug == "first-stitch").unwrap();
        assert_eq!(first.category, Category::News);
        assert!(first.excerpt.contains("Intro"));
        assert!(!first.excerpt.contains("Rest"));
        assert!(first.content.contains("Rest"));
    }

    #[test]
    fn test_duplicate_slug_is_an_error() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "content/news/a.md", "---\nslug: same\n---\nA");
        write(tmp.path(), "content/news/b.md", "---\nslug: same\n---\nB");

        let site = site_in(&tmp);
        let err = ContentLoader::new(&site).load_articles().unwrap_err();
        assert!(err.to_string().contains("Duplicate slug"));
    }

    #[test]
    fn test_unknown_category_skips_file() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "content/news/odd.md", "---\ncategory: gossip\n---\nA");
        write(tmp.path(), "content/news/ok.md", "---\ncategory: blog\n---\nB");

        let site = site_in(&tmp);
        let articles = ContentLoader::new(&site).load_articles().unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].slug, "ok");
    }

    #[test]
    fn test_drafts_future_and_hidden_files() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "content/news/draft.md", "---\npublished: false\n---\nA");
        write(tmp.path(), "content/news/future.md", "---\ndate: 2999-01-01\n---\nA");
        write(tmp.path(), "content/news/_partial.md", "hidden");
        write(tmp.path(), "content/news/_drafts/wip.md", "hidden");
        write(tmp.path(), "content/news/notes.txt", "ignored");
        write(tmp.path(), "content/news/live.md", "---\ndate: 2020-01-01\n---\nA");

        let site = site_in(&tmp);
        let slugs: Vec<_> = ContentLoader::new(&site)
            .load_articles()
            .unwrap()
            .into_iter()
            .map(|a| a.slug)
            .collect();
        assert_eq!(slugs, vec!["live"]);

        let mut config = SiteConfig::default();
        config.render_drafts = true;
        config.future = true;
        let site = Site::with_config(tmp.path(), config);
        let count = ContentLoader::new(&site).load_articles().unwrap().len();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_dates_are_read_in_site_timezone() {
        let tmp = TempDir::new().unwrap();
        let config = SiteConfig {
            timezone: "Pacific/Kiritimati".to_string(),
            ..Default::default()
        };
        let just_now = (config.now() - chrono::Duration::minutes(1))
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        write(
            tmp.path(),
            "content/news/just-posted.md",
            &format!("---\ntitle: Just Posted\ndate: {}\n---\nA", just_now),
        );

        let site = Site::with_config(tmp.path(), config);
        let articles = ContentLoader::new(&site).load_articles().unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].date.offset().local_minus_utc(), 14 * 3600);
    }

    #[test]
    fn test_load_sponsors_team_tapestries_pages() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "content/sponsors/wool-guild.md",
            "---\ntitle: Wool Guild\ntier: gold\nwebsite: https://wool.example.com\n---\nLocal spinners.",
        );
        write(
            tmp.path(),
            "content/sponsors/bad.md",
            "---\ntitle: Bad\ntier: diamond\n---\n",
        );
        write(
            tmp.path(),
            "content/team/anne.md",
            "---\ntitle: Anne\nrole: Lead weaver\norder: 1\n---\nBio.",
        );
        write(
            tmp.path(),
            "content/tapestries/harvest.md",
            "---\ntitle: Harvest\nyear: 1750\nimages:\n  - /media/harvest-1.jpg\n  - /media/harvest-2.jpg\n---\nA harvest scene.",
        );
        write(tmp.path(), "content/pages/about.md", "---\ntitle: About\n---\nUs.");
        write(tmp.path(), "content/pages/news.md", "---\ntitle: Clash\n---\n");

        let site = site_in(&tmp);
        let loader = ContentLoader::new(&site);

        let sponsors = loader.load_sponsors().unwrap();
        assert_eq!(sponsors.len(), 1);
        assert_eq!(sponsors[0].tier, Tier::Gold);

        let team = loader.load_team().unwrap();
        assert_eq!(team[0].role.as_deref(), Some("Lead weaver"));
        assert_eq!(team[0].order, 1);

        let tapestries = loader.load_tapestries().unwrap();
        assert_eq!(tapestries[0].year.as_deref(), Some("1750"));
        assert_eq!(tapestries[0].image.as_deref(), Some("/media/harvest-1.jpg"));
        assert_eq!(tapestries[0].excerpt, "A harvest scene.");

        let pages = loader.load_pages().unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].path, "/about/");
    }

    #[test]
    fn test_missing_content_dir_is_empty() {
        let tmp = TempDir::new().unwrap();
        let site = site_in(&tmp);
        let index = ContentLoader::new(&site).load_all().unwrap();
        assert!(index.articles().is_empty());
        assert!(index.team().is_empty());
    }

    #[test]
    fn test_contact_intro() {
        let tmp = TempDir::new().unwrap();
        let site = site_in(&tmp);
        assert!(ContentLoader::new(&site).load_contact_intro().unwrap().is_none());

        write(
            tmp.path(),
            "content/contact.md",
            "---
title: Contact
---
Visit the **workshop** on Saturdays.",
        );
        let index = ContentLoader::new(&site).load_all().unwrap();
        assert_eq!(
            index.contact_intro(),
            Some("<p>Visit the <strong>workshop</strong> on Saturdays.</p>\n")
        );
    }
}
