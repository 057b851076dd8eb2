//! Typed content records

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Editorial category of an article
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    News,
    Blog,
    Events,
    Press,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::News,
        Category::Blog,
        Category::Events,
        Category::Press,
    ];

    /// URL segment and front-matter spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::News => "news",
            Category::Blog => "blog",
            Category::Events => "events",
            Category::Press => "press",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::News => "News",
            Category::Blog => "Blog",
            Category::Events => "Events",
            Category::Press => "Press",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == lowered)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown category: {:?}. Available: news, blog, events, press",
                    s
                )
            })
    }
}

/// Sponsor tier; declaration order is display order
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Platinum,
    Gold,
    Silver,
    Bronze,
    #[default]
    Partner,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::Platinum,
        Tier::Gold,
        Tier::Silver,
        Tier::Bronze,
        Tier::Partner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Platinum => "platinum",
            Tier::Gold => "gold",
            Tier::Silver => "silver",
            Tier::Bronze => "bronze",
            Tier::Partner => "partner",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tier::Platinum => "Platinum",
            Tier::Gold => "Gold",
            Tier::Silver => "Silver",
            Tier::Bronze => "Bronze",
            Tier::Partner => "Partners",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Tier::ALL
            .into_iter()
            .find(|t| t.as_str() == lowered)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown tier: {:?}. Available: platinum, gold, silver, bronze, partner",
                    s
                )
            })
    }
}

/// A news or blog article
#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub title: String,
    pub slug: String,
    pub date: DateTime<FixedOffset>,
    pub updated: Option<DateTime<FixedOffset>>,
    pub category: Category,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub featured: bool,
    pub published: bool,
    pub image: Option<String>,

    /// Raw markdown body
    pub raw: String,
    /// Rendered HTML body
    pub content: String,
    /// Rendered HTML excerpt
    pub excerpt: String,

    /// Source file path relative to the content directory
    pub source: String,
    #[serde(skip)]
    pub full_source: PathBuf,
    /// URL path, always starting and ending with `/`
    pub path: String,

    /// Custom front-matter fields
    pub extra: HashMap<String, serde_yaml::Value>,
}

/// A member of the project team
#[derive(Debug, Clone, Serialize)]
pub struct TeamMember {
    pub name: String,
    pub slug: String,
    pub role: Option<String>,
    pub image: Option<String>,
    pub order: i64,
    pub links: HashMap<String, String>,
    /// Rendered biography
    pub bio: String,
    pub source: String,
}

/// A sponsor or partner organisation
#[derive(Debug, Clone, Serialize)]
pub struct Sponsor {
    pub name: String,
    pub slug: String,
    pub tier: Tier,
    pub website: Option<String>,
    pub logo: Option<String>,
    pub order: i64,
    /// Rendered description
    pub description: String,
    pub source: String,
}

/// A tapestry shown in the gallery
#[derive(Debug, Clone, Serialize)]
pub struct Tapestry {
    pub title: String,
    pub slug: String,
    pub year: Option<String>,
    pub location: Option<String>,
    pub dimensions: Option<String>,
    pub technique: Option<String>,
    pub image: Option<String>,
    pub images: Vec<String>,
    pub featured: bool,
    pub order: i64,
    pub content: String,
    pub excerpt: String,
    pub source: String,
    pub path: String,
}

/// A standalone page (about, privacy, ...)
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub title: String,
    pub slug: String,
    pub updated: Option<DateTime<FixedOffset>>,
    pub content: String,
    pub source: String,
    pub path: String,
    /// Custom front-matter fields
    pub extra: HashMap<String, serde_yaml::Value>,
}
