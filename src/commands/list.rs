//! List site content

use anyhow::{bail, Result};
use std::fmt::Write;

use crate::content::loader::ContentLoader;
use crate::content::ContentIndex;
use crate::Site;

/// Print one kind of content
pub fn run(site: &Site, content_type: &str) -> Result<()> {
    let index = ContentLoader::new(site).load_all()?;
    print!("{}", describe(&index, content_type)?);
    Ok(())
}

/// Text listing of one kind of content
pub fn describe(index: &ContentIndex, content_type: &str) -> Result<String> {
    let mut out = String::new();

    match content_type {
        "news" | "article" | "articles" => {
            let articles = index.articles();
            writeln!(out, "Articles ({}):", articles.len())?;
            for article in articles {
                writeln!(
                    out,
                    "  {} - {} ({}){} [{}]",
                    article.date.format("%Y-%m-%d"),
                    article.title,
                    article.category,
                    if article.published { "" } else { " draft" },
                    article.source
                )?;
            }
        }
        "team" => {
            writeln!(out, "Team ({}):", index.team().len())?;
            for member in index.team() {
                match &member.role {
                    Some(role) => writeln!(out, "  {} - {} [{}]", member.name, role, member.source)?,
                    None => writeln!(out, "  {} [{}]", member.name, member.source)?,
                }
            }
        }
        "sponsor" | "sponsors" => {
            writeln!(out, "Sponsors ({}):", index.sponsor_count())?;
            for (tier, sponsors) in index.sponsors_by_tier() {
                writeln!(out, "  {}:", tier.label())?;
                for sponsor in sponsors {
                    writeln!(out, "    {} [{}]", sponsor.name, sponsor.source)?;
                }
            }
        }
        "tapestry" | "tapestries" => {
            writeln!(out, "Tapestries ({}):", index.tapestries().len())?;
            for tapestry in index.tapestries() {
                writeln!(
                    out,
                    "  {}{}{} [{}]",
                    tapestry.title,
                    tapestry
                        .year
                        .as_ref()
                        .map(|y| format!(" ({})", y))
                        .unwrap_or_default(),
                    if tapestry.featured { " *" } else { "" },
                    tapestry.source
                )?;
            }
        }
        "page" | "pages" => {
            writeln!(out, "Pages ({}):", index.pages().len())?;
            for page in index.pages() {
                writeln!(out, "  {} {} [{}]", page.path, page.title, page.source)?;
            }
        }
        "category" | "categories" => {
            let categories = index.categories();
            writeln!(out, "Categories ({}):", categories.len())?;
            for (category, count) in categories {
                writeln!(out, "  {} ({})", category.label(), count)?;
            }
        }
        "tag" | "tags" => {
            let mut tags = index.tags();
            tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            writeln!(out, "Tags ({}):", tags.len())?;
            for (tag, count) in tags {
                writeln!(out, "  {} ({})", tag, count)?;
            }
        }
        _ => {
            bail!(
                "Unknown type: {}. Available: news, team, sponsors, tapestries, pages, categories, tags",
                content_type
            );
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use std::fs;
    use tempfile::TempDir;

    fn index_with_content() -> ContentIndex {
        let tmp = TempDir::new().unwrap();
        let news = tmp.path().join("content/news");
        fs::create_dir_all(&news).unwrap();
        fs::write(
            news.join("a.md"),
            "---\ntitle: Loom arrives\ndate: 2024-02-01\ncategory: events\ntags: [loom, wool]\n---\nA",
        )
        .unwrap();
        fs::write(
            news.join("b.md"),
            "---\ntitle: Wool order\ndate: 2024-01-01\ntags: wool\n---\nB",
        )
        .unwrap();
        let site = Site::with_config(tmp.path(), SiteConfig::default());
        ContentLoader::new(&site).load_all().unwrap()
    }

    #[test]
    fn test_list_news_and_tags() {
        let index = index_with_content();

        let news = describe(&index, "news").unwrap();
        assert!(news.starts_with("Articles (2):"));
        assert!(news.contains("2024-02-01 - Loom arrives (events)"));

        let tags = describe(&index, "tags").unwrap();
        assert_eq!(tags, "Tags (2):\n  wool (2)\n  loom (1)\n");

        let categories = describe(&index, "categories").unwrap();
        assert!(categories.contains("Events (1)"));
        assert!(categories.contains("News (1)"));
    }

    #[test]
    fn test_unknown_type() {
        assert!(describe(&ContentIndex::default(), "posts").is_err());
    }
}
