//! In-memory content index with the lookups pages are built from

use std::collections::BTreeMap;

use super::{Article, Category, Page, Sponsor, Tapestry, TeamMember, Tier};

/// All loaded content, sorted once at construction.
///
/// Articles are newest first (ties broken by slug), team members, sponsors
/// and tapestries by their `order` field and then by name.
#[derive(Debug, Clone, Default)]
pub struct ContentIndex {
    articles: Vec<Article>,
    team: Vec<TeamMember>,
    sponsors: Vec<Sponsor>,
    tapestries: Vec<Tapestry>,
    pages: Vec<Page>,
    contact_intro: Option<String>,
}

impl ContentIndex {
    pub fn new(
        mut articles: Vec<Article>,
        mut team: Vec<TeamMember>,
        mut sponsors: Vec<Sponsor>,
        mut tapestries: Vec<Tapestry>,
        mut pages: Vec<Page>,
    ) -> Self {
        articles.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.slug.cmp(&b.slug)));
        team.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));
        sponsors.sort_by(|a, b| {
            a.tier
                .cmp(&b.tier)
                .then_with(|| a.order.cmp(&b.order))
                .then_with(|| a.name.cmp(&b.name))
        });
        tapestries.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.title.cmp(&b.title)));
        pages.sort_by(|a, b| a.slug.cmp(&b.slug));

        Self {
            articles,
            team,
            sponsors,
            tapestries,
            pages,
            contact_intro: None,
        }
    }

    /// Attach the rendered introduction shown above the contact form
    pub fn with_contact_intro(mut self, intro: Option<String>) -> Self {
        self.contact_intro = intro;
        self
    }

    pub fn contact_intro(&self) -> Option<&str> {
        self.contact_intro.as_deref()
    }

    /// All articles, newest first
    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    pub fn article(&self, slug: &str) -> Option<&Article> {
        self.articles.iter().find(|a| a.slug == slug)
    }

    pub fn articles_in(&self, category: Category) -> Vec<&Article> {
        self.articles
            .iter()
            .filter(|a| a.category == category)
            .collect()
    }

    pub fn articles_tagged(&self, tag: &str) -> Vec<&Article> {
        self.articles
            .iter()
            .filter(|a| a.tags.iter().any(|t| t == tag))
            .collect()
    }

    /// The `n` most recent articles
    pub fn latest(&self, n: usize) -> Vec<&Article> {
        self.articles.iter().take(n).collect()
    }

    pub fn featured_articles(&self) -> Vec<&Article> {
        self.articles.iter().filter(|a| a.featured).collect()
    }

    /// The newer and older neighbours of an article
    pub fn neighbors(&self, slug: &str) -> (Option<&Article>, Option<&Article>) {
        let Some(pos) = self.articles.iter().position(|a| a.slug == slug) else {
            return (None, None);
        };
        let newer = pos.checked_sub(1).and_then(|i| self.articles.get(i));
        let older = self.articles.get(pos + 1);
        (newer, older)
    }

    /// Non-empty categories with their article counts, in enum order
    pub fn categories(&self) -> Vec<(Category, usize)> {
        Category::ALL
            .into_iter()
            .map(|c| (c, self.articles.iter().filter(|a| a.category == c).count()))
            .filter(|(_, count)| *count > 0)
            .collect()
    }

    /// Tag counts sorted by tag name
    pub fn tags(&self) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for tag in self.articles.iter().flat_map(|a| a.tags.iter()) {
            *counts.entry(tag.as_str()).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .map(|(tag, count)| (tag.to_string(), count))
            .collect()
    }

    pub fn team(&self) -> &[TeamMember] {
        &self.team
    }

    pub fn sponsor_count(&self) -> usize {
        self.sponsors.len()
    }

    /// Sponsors grouped by tier in display order; empty tiers are omitted
    pub fn sponsors_by_tier(&self) -> Vec<(Tier, Vec<&Sponsor>)> {
        Tier::ALL
            .into_iter()
            .map(|tier| {
                let members: Vec<&Sponsor> =
                    self.sponsors.iter().filter(|s| s.tier == tier).collect();
                (tier, members)
            })
            .filter(|(_, members)| !members.is_empty())
            .collect()
    }

    pub fn tapestries(&self) -> &[Tapestry] {
        &self.tapestries
    }

    pub fn tapestry(&self, slug: &str) -> Option<&Tapestry> {
        self.tapestries.iter().find(|t| t.slug == slug)
    }

    pub fn featured_tapestries(&self) -> Vec<&Tapestry> {
        self.tapestries.iter().filter(|t| t.featured).collect()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, slug: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.slug == slug)
    }
}
