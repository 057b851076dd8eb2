//! Generator module - writes the static site using the built-in Tera templates

use anyhow::{Context as _, Result};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use tera::Context;
use walkdir::WalkDir;

use crate::content::{Article, Category, ContentIndex, Sponsor, Tier};
use crate::helpers::{
    absolutize_urls, date_xml, escape_xml, full_url_for, strip_html, strip_invalid_xml_chars,
    truncate,
};
use crate::templates::{PaginationData, TemplateRenderer, ASSETS};
use crate::Site;

/// Length of the plain-text description used in `<meta>` tags
const DESCRIPTION_LENGTH: usize = 160;

/// A category filter link on news listings
#[derive(Debug, Clone, Serialize)]
struct CategoryLink {
    name: &'static str,
    label: &'static str,
    count: usize,
    path: String,
}

/// Sponsors of one tier, for the sponsors page and the home strip
#[derive(Debug, Serialize)]
struct TierGroup<'a> {
    tier: &'static str,
    label: &'static str,
    sponsors: Vec<&'a Sponsor>,
}

#[derive(Debug, Clone)]
struct SitemapEntry {
    path: String,
    lastmod: Option<DateTime<FixedOffset>>,
}

/// Static site generator using Tera templates
pub struct Generator {
    site: Site,
    renderer: TemplateRenderer,
}

impl Generator {
    /// Create a new generator
    pub fn new(site: &Site) -> Result<Self> {
        let renderer = TemplateRenderer::new(&site.config)?;

        Ok(Self {
            site: site.clone(),
            renderer,
        })
    }

    /// Generate the entire site
    pub fn generate(&self, index: &ContentIndex) -> Result<()> {
        fs::create_dir_all(&self.site.public_dir).with_context(|| {
            format!("Failed to create {}", self.site.public_dir.display())
        })?;

        self.write_assets()?;
        self.copy_static_dir()?;

        let mut sitemap = Vec::new();

        self.generate_home(index, &mut sitemap)?;
        self.generate_news_pages(index, &mut sitemap)?;
        self.generate_category_pages(index, &mut sitemap)?;
        self.generate_article_pages(index, &mut sitemap)?;
        self.generate_team_page(index, &mut sitemap)?;
        self.generate_sponsors_page(index, &mut sitemap)?;
        self.generate_tapestry_pages(index, &mut sitemap)?;
        self.generate_contact_page(index, &mut sitemap)?;
        self.generate_standalone_pages(index, &mut sitemap)?;
        self.generate_not_found()?;

        self.generate_atom_feed(index.articles())?;
        self.generate_sitemap(&sitemap)?;

        tracing::info!(
            "Generated {} pages into {:?}",
            sitemap.len(),
            self.site.public_dir
        );
        Ok(())
    }

    fn base_context(&self, current_path: &str) -> Context {
        TemplateRenderer::base_context(&self.site.config, current_path)
    }

    /// Home page: latest news, featured tapestries, sponsor strip
    fn generate_home(&self, index: &ContentIndex, sitemap: &mut Vec<SitemapEntry>) -> Result<()> {
        let mut context = self.base_context("/");
        context.insert("latest", &index.latest(self.site.config.home_news_count));
        context.insert("featured_tapestries", &index.featured_tapestries());
        context.insert("sponsor_tiers", &tier_groups(index));

        let html = self.renderer.render("home.html", &context)?;
        self.write_page("/", &html)?;
        sitemap.push(SitemapEntry {
            path: "/".to_string(),
            lastmod: index.articles().first().map(|a| a.updated.unwrap_or(a.date)),
        });
        Ok(())
    }

    /// Paginated list of every article
    fn generate_news_pages(
        &self,
        index: &ContentIndex,
        sitemap: &mut Vec<SitemapEntry>,
    ) -> Result<()> {
        let articles: Vec<&Article> = index.articles().iter().collect();
        self.generate_listing(index, "/news/", "News", "", &articles, sitemap)
    }

    /// One paginated listing per category, empty ones included
    fn generate_category_pages(
        &self,
        index: &ContentIndex,
        sitemap: &mut Vec<SitemapEntry>,
    ) -> Result<()> {
        for category in Category::ALL {
            let base = category_path(category);
            let articles = index.articles_in(category);
            self.generate_listing(
                index,
                &base,
                category.label(),
                category.as_str(),
                &articles,
                sitemap,
            )?;
        }
        Ok(())
    }

    fn generate_listing(
        &self,
        index: &ContentIndex,
        base: &str,
        heading: &str,
        current_category: &str,
        articles: &[&Article],
        sitemap: &mut Vec<SitemapEntry>,
    ) -> Result<()> {
        let per_page = self.site.config.per_page;
        let total_pages = articles.len().div_ceil(per_page).max(1);
        let categories = category_links(index);

        for page_num in 1..=total_pages {
            let start = (page_num - 1) * per_page;
            let end = (start + per_page).min(articles.len());
            let page_articles = &articles[start..end];

            let pagination = PaginationData::new(base, page_num, total_pages, per_page);

            let mut context = self.base_context(&pagination.current_url);
            context.insert("page_title", heading);
            context.insert("heading", heading);
            context.insert("current_category", current_category);
            context.insert("categories", &categories);
            context.insert("articles", page_articles);
            context.insert("pagination", &pagination);

            let html = self.renderer.render("news.html", &context)?;
            self.write_page(&pagination.current_url, &html)?;
            sitemap.push(SitemapEntry {
                path: pagination.current_url.clone(),
                lastmod: page_articles.first().map(|a| a.updated.unwrap_or(a.date)),
            });
        }

        Ok(())
    }

    /// Individual article pages with newer/older navigation
    fn generate_article_pages(
        &self,
        index: &ContentIndex,
        sitemap: &mut Vec<SitemapEntry>,
    ) -> Result<()> {
        for article in index.articles() {
            let (newer, older) = index.neighbors(&article.slug);

            let mut context = self.base_context(&article.path);
            context.insert("page_title", &article.title);
            context.insert("page_description", &describe(&article.excerpt));
            if let Some(image) = &article.image {
                context.insert("page_image", image);
            }
            context.insert("article", article);
            context.insert("newer", &newer);
            context.insert("older", &older);

            let html = self.renderer.render("article.html", &context)?;
            self.write_page(&article.path, &html)?;
            sitemap.push(SitemapEntry {
                path: article.path.clone(),
                lastmod: Some(article.updated.unwrap_or(article.date)),
            });
        }
        Ok(())
    }

    fn generate_team_page(
        &self,
        index: &ContentIndex,
        sitemap: &mut Vec<SitemapEntry>,
    ) -> Result<()> {
        let mut context = self.base_context("/team/");
        context.insert("page_title", "Team");
        context.insert("team", index.team());

        let html = self.renderer.render("team.html", &context)?;
        self.write_page("/team/", &html)?;
        sitemap.push(SitemapEntry {
            path: "/team/".to_string(),
            lastmod: None,
        });
        Ok(())
    }

    fn generate_sponsors_page(
        &self,
        index: &ContentIndex,
        sitemap: &mut Vec<SitemapEntry>,
    ) -> Result<()> {
        let mut context = self.base_context("/sponsors/");
        context.insert("page_title", "Sponsors");
        context.insert("sponsor_tiers", &tier_groups(index));

        let html = self.renderer.render("sponsors.html", &context)?;
        self.write_page("/sponsors/", &html)?;
        sitemap.push(SitemapEntry {
            path: "/sponsors/".to_string(),
            lastmod: None,
        });
        Ok(())
    }

    /// Gallery index and one detail page per tapestry
    fn generate_tapestry_pages(
        &self,
        index: &ContentIndex,
        sitemap: &mut Vec<SitemapEntry>,
    ) -> Result<()> {
        let mut context = self.base_context("/tapestries/");
        context.insert("page_title", "Tapestries");
        context.insert("tapestries", index.tapestries());
        let html = self.renderer.render("tapestries.html", &context)?;
        self.write_page("/tapestries/", &html)?;
        sitemap.push(SitemapEntry {
            path: "/tapestries/".to_string(),
            lastmod: None,
        });

        for tapestry in index.tapestries() {
            let mut context = self.base_context(&tapestry.path);
            context.insert("page_title", &tapestry.title);
            context.insert("page_description", &tapestry.excerpt);
            if let Some(image) = &tapestry.image {
                context.insert("page_image", image);
            }
            context.insert("tapestry", tapestry);

            let html = self.renderer.render("tapestry.html", &context)?;
            self.write_page(&tapestry.path, &html)?;
            sitemap.push(SitemapEntry {
                path: tapestry.path.clone(),
                lastmod: None,
            });
        }
        Ok(())
    }

    fn generate_contact_page(
        &self,
        index: &ContentIndex,
        sitemap: &mut Vec<SitemapEntry>,
    ) -> Result<()> {
        let mut context = self.base_context("/contact/");
        context.insert("page_title", "Contact");
        context.insert("intro", index.contact_intro().unwrap_or_default());

        let html = self.renderer.render("contact.html", &context)?;
        self.write_page("/contact/", &html)?;
        sitemap.push(SitemapEntry {
            path: "/contact/".to_string(),
            lastmod: None,
        });
        Ok(())
    }

    /// Standalone pages (about, privacy, ...)
    fn generate_standalone_pages(
        &self,
        index: &ContentIndex,
        sitemap: &mut Vec<SitemapEntry>,
    ) -> Result<()> {
        for page in index.pages() {
            let mut context = self.base_context(&page.path);
            context.insert("page_title", &page.title);
            context.insert("page_description", &describe(&page.content));
            context.insert("page", page);

            let html = self.renderer.render("page.html", &context)?;
            self.write_page(&page.path, &html)?;
            sitemap.push(SitemapEntry {
                path: page.path.clone(),
                lastmod: page.updated,
            });
        }
        Ok(())
    }

    fn generate_not_found(&self) -> Result<()> {
        let mut context = self.base_context("/404.html");
        context.insert("page_title", "Page not found");
        let html = self.renderer.render("404.html", &context)?;
        self.write_file("404.html", &html)
    }

    /// Generate the Atom feed
    fn generate_atom_feed(&self, articles: &[Article]) -> Result<()> {
        let config = &self.site.config;
        let base_url = full_url_for(config, "/");
        let origin = config.url.trim_end_matches('/');

        let mut feed = String::new();
        feed.push_str(r#"<?xml version="1.0" encoding="utf-8"?>"#);
        feed.push('\n');
        feed.push_str(r#"<feed xmlns="http://www.w3.org/2005/Atom">"#);
        feed.push('\n');
        feed.push_str(&format!("  <title>{}</title>\n", escape_xml(&config.title)));
        if !config.subtitle.is_empty() {
            feed.push_str(&format!(
                "  <subtitle>{}</subtitle>\n",
                escape_xml(&config.subtitle)
            ));
        }
        feed.push_str(&format!(
            "  <link href=\"{}\" rel=\"self\"/>\n",
            full_url_for(config, "/atom.xml")
        ));
        feed.push_str(&format!("  <link href=\"{}\"/>\n", base_url));
        let updated = articles
            .iter()
            .map(|a| a.updated.unwrap_or(a.date))
            .max()
            .unwrap_or_else(|| config.now());
        feed.push_str(&format!("  <updated>{}</updated>\n", date_xml(&updated)));
        feed.push_str(&format!("  <id>{}</id>\n", base_url));
        feed.push_str(&format!(
            "  <author><name>{}</name></author>\n",
            escape_xml(&config.author)
        ));

        for article in articles.iter().take(config.feed_limit) {
            let link = full_url_for(config, &article.path);
            feed.push_str("  <entry>\n");
            feed.push_str(&format!(
                "    <title>{}</title>\n",
                escape_xml(&article.title)
            ));
            feed.push_str(&format!("    <link href=\"{}\"/>\n", link));
            feed.push_str(&format!("    <id>{}</id>\n", link));
            feed.push_str(&format!(
                "    <published>{}</published>\n",
                date_xml(&article.date)
            ));
            feed.push_str(&format!(
                "    <updated>{}</updated>\n",
                date_xml(&article.updated.unwrap_or(article.date))
            ));
            feed.push_str(&format!(
                "    <category term=\"{}\"/>\n",
                article.category.as_str()
            ));
            feed.push_str(&format!(
                "    <summary>{}</summary>\n",
                escape_xml(&describe(&article.excerpt))
            ));
            let content = strip_invalid_xml_chars(&absolutize_urls(&article.content, origin));
            feed.push_str(&format!(
                "    <content type=\"html\"><![CDATA[{}]]></content>\n",
                content.replace("]]>", "]]]]><![CDATA[>")
            ));
            feed.push_str("  </entry>\n");
        }

        feed.push_str("</feed>\n");

        self.write_file("atom.xml", &feed)?;
        tracing::info!("Generated atom.xml");
        Ok(())
    }

    fn generate_sitemap(&self, entries: &[SitemapEntry]) -> Result<()> {
        let mut xml = String::new();
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        xml.push_str(r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#);
        xml.push('\n');
        for entry in entries {
            xml.push_str("  <url>\n");
            xml.push_str(&format!(
                "    <loc>{}</loc>\n",
                escape_xml(&full_url_for(&self.site.config, &entry.path))
            ));
            if let Some(lastmod) = entry.lastmod {
                xml.push_str(&format!("    <lastmod>{}</lastmod>\n", date_xml(&lastmod)));
            }
            xml.push_str("  </url>\n");
        }
        xml.push_str("</urlset>\n");

        self.write_file("sitemap.xml", &xml)?;
        tracing::info!("Generated sitemap.xml ({} urls)", entries.len());
        Ok(())
    }

    /// Write the embedded stylesheet and scripts
    fn write_assets(&self) -> Result<()> {
        for (path, contents) in ASSETS {
            self.write_file(path, contents)?;
        }
        Ok(())
    }

    /// Copy `static/` verbatim; files there override the embedded assets
    fn copy_static_dir(&self) -> Result<()> {
        let static_dir = &self.site.static_dir;
        if !static_dir.exists() {
            return Ok(());
        }

        for entry in WalkDir::new(static_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let relative = path.strip_prefix(static_dir)?;
            let dest = self.site.public_dir.join(relative);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(path, &dest)
                .with_context(|| format!("Failed to copy {:?} to {:?}", path, dest))?;
        }

        Ok(())
    }

    /// Write `index.html` under the directory for a URL path
    fn write_page(&self, url_path: &str, html: &str) -> Result<PathBuf> {
        // Strip slashes to avoid creating absolute paths
        let clean_path = url_path.trim_matches('/');
        let output_path = if clean_path.is_empty() {
            self.site.public_dir.join("index.html")
        } else {
            self.site.public_dir.join(clean_path).join("index.html")
        };
        self.write_to(&output_path, html)?;
        Ok(output_path)
    }

    fn write_file(&self, relative: &str, contents: &str) -> Result<()> {
        let output_path = self.site.public_dir.join(relative);
        self.write_to(&output_path, contents)
    }

    fn write_to(&self, output_path: &Path, contents: &str) -> Result<()> {
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create dir {:?}", parent))?;
        }
        fs::write(output_path, contents)
            .with_context(|| format!("Failed to write {:?}", output_path))?;
        tracing::debug!("Generated: {:?}", output_path);
        Ok(())
    }
}

fn category_path(category: Category) -> String {
    format!("/news/category/{}/", category.as_str())
}

fn category_links(index: &ContentIndex) -> Vec<CategoryLink> {
    index
        .categories()
        .into_iter()
        .map(|(category, count)| CategoryLink {
            name: category.as_str(),
            label: category.label(),
            count,
            path: category_path(category),
        })
        .collect()
}

fn tier_groups(index: &ContentIndex) -> Vec<TierGroup<'_>> {
    index
        .sponsors_by_tier()
        .into_iter()
        .map(|(tier, sponsors): (Tier, Vec<&Sponsor>)| TierGroup {
            tier: tier.as_str(),
            label: tier.label(),
            sponsors,
        })
        .collect()
}

/// Plain-text description from rendered HTML
fn describe(html: &str) -> String {
    let text = strip_html(html);
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate(&text, DESCRIPTION_LENGTH, "…")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::content::loader::ContentLoader;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn build(tmp: &TempDir, config: SiteConfig) -> Site {
        let site = Site::with_config(tmp.path(), config);
        let index = ContentLoader::new(&site).load_all().unwrap();
        Generator::new(&site).unwrap().generate(&index).unwrap();
        site
    }

    fn read(site: &Site, rel: &str) -> String {
        fs::read_to_string(site.public_dir.join(rel)).unwrap()
    }

    fn sample_content(tmp: &TempDir) {
        for (i, slug) in ["alpha", "beta", "gamma"].iter().enumerate() {
            write(
                tmp.path(),
                &format!("content/news/{}.md", slug),
                &format!(
                    "---\ntitle: {}\ndate: 2024-0{}-01\ncategory: {}\n---\nBody of {}.",
                    slug.to_uppercase(),
                    i + 1,
                    if i == 0 { "events" } else { "news" },
                    slug
                ),
            );
        }
        write(
            tmp.path(),
            "content/tapestries/harvest.md",
            "---\ntitle: Harvest\nfeatured: true\n---\nA harvest scene.",
        );
        write(
            tmp.path(),
            "content/sponsors/guild.md",
            "---\ntitle: Wool Guild\ntier: gold\n---\nSpinners.",
        );
        write(tmp.path(), "content/team/anne.md", "---\ntitle: Anne\n---\nWeaver.");
        write(tmp.path(), "content/pages/about.md", "---\ntitle: About us\n---\nHello.");
        write(tmp.path(), "static/images/logo.svg", "<svg/>");
    }

    #[test]
    fn test_generates_every_section() {
        let tmp = TempDir::new().unwrap();
        sample_content(&tmp);
        let site = build(&tmp, SiteConfig::default());

        for rel in [
            "index.html",
            "news/index.html",
            "news/alpha/index.html",
            "news/category/events/index.html",
            "news/category/press/index.html",
            "team/index.html",
            "sponsors/index.html",
            "tapestries/index.html",
            "tapestries/harvest/index.html",
            "contact/index.html",
            "about/index.html",
            "404.html",
            "atom.xml",
            "sitemap.xml",
            "assets/style.css",
            "assets/forms.js",
            "images/logo.svg",
        ] {
            assert!(site.public_dir.join(rel).is_file(), "missing {}", rel);
        }
    }

    #[test]
    fn test_home_and_article_content() {
        let tmp = TempDir::new().unwrap();
        sample_content(&tmp);
        let config = SiteConfig {
            home_news_count: 2,
            ..Default::default()
        };
        let site = build(&tmp, config);

        let home = read(&site, "index.html");
        assert!(home.contains("GAMMA"));
        assert!(home.contains("BETA"));
        assert!(!home.contains("ALPHA"));
        assert!(home.contains("Harvest"));
        assert!(home.contains("Wool Guild"));
        assert!(home.contains(r#"action="/api/newsletter""#));

        // beta sits between gamma (newer) and alpha (older)
        let beta = read(&site, "news/beta/index.html");
        assert!(beta.contains(r#"href="/news/gamma/""#));
        assert!(beta.contains(r#"href="/news/alpha/""#));
        assert!(beta.contains("<title>BETA | Heritage Tapestries</title>"));

        let sponsors = read(&site, "sponsors/index.html");
        assert!(sponsors.contains("tier-gold"));
    }

    #[test]
    fn test_news_pagination() {
        let tmp = TempDir::new().unwrap();
        sample_content(&tmp);
        let config = SiteConfig {
            per_page: 2,
            ..Default::default()
        };
        let site = build(&tmp, config);

        let first = read(&site, "news/index.html");
        assert!(first.contains(r#"href="/news/page/2/""#));
        let second = read(&site, "news/page/2/index.html");
        assert!(second.contains("ALPHA"));
        assert!(second.contains("Page 2 of 2"));
        assert!(!site.public_dir.join("news/page/3/index.html").exists());
    }

    #[test]
    fn test_feed_and_sitemap_use_absolute_urls() {
        let tmp = TempDir::new().unwrap();
        sample_content(&tmp);
        let config = SiteConfig {
            url: "https://tapestries.example.org".to_string(),
            feed_limit: 2,
            ..Default::default()
        };
        let site = build(&tmp, config);

        let feed = read(&site, "atom.xml");
        assert_eq!(feed.matches("<entry>").count(), 2);
        assert!(feed.contains(r#"<link href="https://tapestries.example.org/news/gamma/"/>"#));

        let sitemap = read(&site, "sitemap.xml");
        assert!(sitemap.contains("<loc>https://tapestries.example.org/team/</loc>"));
        assert!(sitemap.contains("<loc>https://tapestries.example.org/about/</loc>"));
        assert!(!sitemap.contains("404.html"));
    }

    #[test]
    fn test_empty_site_still_builds() {
        let tmp = TempDir::new().unwrap();
        let site = build(&tmp, SiteConfig::default());
        assert!(read(&site, "index.html").contains("No news yet."));
        assert!(read(&site, "news/index.html").contains("No articles here yet."));
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe("<p>Hello\n  <em>world</em></p>"), "Hello world");
    }
}
