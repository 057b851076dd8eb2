//! Front-matter parsing

use anyhow::{anyhow, Result};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// `tags: wool` and `tags: [wool, linen]` both become a list
fn string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(value)) => vec![value],
        Some(OneOrMany::Many(values)) => values,
        None => Vec::new(),
    })
}

/// Accepts dates and years written either as YAML strings or bare scalars
fn scalar_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_yaml::Value::String(s)) => Some(s),
        Some(serde_yaml::Value::Number(n)) => Some(n.to_string()),
        Some(serde_yaml::Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// Front-matter shared by every content collection.
///
/// Collection-specific fields (`role`, `tier`, `technique`, ...) are optional
/// here and interpreted by the loader for the collection that uses them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    /// Team members and sponsors may say `name` instead
    #[serde(alias = "name")]
    pub title: Option<String>,
    pub slug: Option<String>,
    #[serde(deserialize_with = "scalar_as_string")]
    pub date: Option<String>,
    #[serde(deserialize_with = "scalar_as_string")]
    pub updated: Option<String>,
    pub category: Option<String>,
    pub author: Option<String>,
    pub excerpt: Option<String>,
    pub image: Option<String>,
    #[serde(deserialize_with = "string_or_vec", default)]
    pub tags: Vec<String>,
    pub featured: bool,
    #[serde(default = "default_published")]
    pub published: bool,
    pub order: Option<i64>,

    // Team
    pub role: Option<String>,
    pub links: HashMap<String, String>,

    // Sponsors
    pub tier: Option<String>,
    pub website: Option<String>,
    pub logo: Option<String>,

    // Tapestries
    #[serde(deserialize_with = "scalar_as_string")]
    pub year: Option<String>,
    pub location: Option<String>,
    pub dimensions: Option<String>,
    pub technique: Option<String>,
    #[serde(deserialize_with = "string_or_vec", default)]
    pub images: Vec<String>,

    /// Additional custom fields
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

fn default_published() -> bool {
    true
}

impl Default for FrontMatter {
    fn default() -> Self {
        Self {
            title: None,
            slug: None,
            date: None,
            updated: None,
            category: None,
            author: None,
            excerpt: None,
            image: None,
            tags: Vec::new(),
            featured: false,
            published: true,
            order: None,
            role: None,
            links: HashMap::new(),
            tier: None,
            website: None,
            logo: None,
            year: None,
            location: None,
            dimensions: None,
            technique: None,
            images: Vec::new(),
            extra: HashMap::new(),
        }
    }
}

impl FrontMatter {
    /// Parse front-matter from content string
    /// Returns (front_matter, remaining_content)
    pub fn parse(content: &str) -> Result<(Self, &str)> {
        let content = content.trim_start_matches('\u{feff}').trim_start();

        if content.starts_with("---") {
            return Self::parse_yaml(content);
        }

        if content.starts_with(";;;") || content.starts_with('{') {
            return Self::parse_json(content);
        }

        Ok((FrontMatter::default(), content))
    }

    fn parse_yaml(content: &str) -> Result<(Self, &str)> {
        let rest = &content[3..];
        let rest = rest.trim_start_matches(['\n', '\r']);

        let Some(end_pos) = rest.find("\n---") else {
            // No closing ---, treat as no front-matter
            return Ok((FrontMatter::default(), content));
        };

        let yaml_content = &rest[..end_pos];
        let remaining = &rest[end_pos + 4..];
        let remaining = remaining.trim_start_matches(['-']).trim_start_matches(['\n', '\r']);

        if yaml_content.trim().is_empty() {
            return Ok((FrontMatter::default(), remaining));
        }

        // A `---` block made of prose or lists is a thematic break, not metadata
        if !looks_like_yaml(yaml_content) {
            return Ok((FrontMatter::default(), content));
        }

        match serde_yaml::from_str::<FrontMatter>(yaml_content) {
            Ok(fm) => Ok((fm, remaining)),
            Err(e) => {
                tracing::warn!(
                    "Failed to parse YAML front-matter, treating as content: {}",
                    e
                );
                Ok((FrontMatter::default(), content))
            }
        }
    }

    fn parse_json(content: &str) -> Result<(Self, &str)> {
        if let Some(rest) = content.strip_prefix(";;;") {
            if let Some(end_pos) = rest.find(";;;") {
                let json_content = rest[..end_pos].trim();
                let remaining = rest[end_pos + 3..].trim_start_matches(['\n', '\r']);

                let json_content = if json_content.starts_with('{') {
                    json_content.to_string()
                } else {
                    format!("{{{}}}", json_content)
                };
                let fm: FrontMatter = serde_json::from_str(&json_content)
                    .map_err(|e| anyhow!("Failed to parse JSON front-matter: {}", e))?;

                return Ok((fm, remaining));
            }
        }

        if content.starts_with('{') {
            let mut depth = 0;
            let mut in_string = false;
            let mut escaped = false;
            let mut end_pos = 0;
            for (i, c) in content.char_indices() {
                if in_string {
                    match c {
                        _ if escaped => escaped = false,
                        '\\' => escaped = true,
                        '"' => in_string = false,
                        _ => {}
                    }
                    continue;
                }
                match c {
                    '"' => in_string = true,
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            end_pos = i + 1;
                            break;
                        }
                    }
                    _ => {}
                }
            }

            if end_pos > 0 {
                let json_content = &content[..end_pos];
                let remaining = content[end_pos..].trim_start_matches(['\n', '\r']);

                let fm: FrontMatter = serde_json::from_str(json_content)
                    .map_err(|e| anyhow!("Failed to parse JSON front-matter: {}", e))?;

                return Ok((fm, remaining));
            }
        }

        Err(anyhow!("Invalid JSON front-matter"))
    }

    /// Parse the date; times without an offset are read in `tz`
    /// (host local time when `None`)
    pub fn parse_date(&self, tz: Option<Tz>) -> Option<DateTime<FixedOffset>> {
        self.date.as_deref().and_then(|s| parse_date_string(s, tz))
    }

    pub fn parse_updated(&self, tz: Option<Tz>) -> Option<DateTime<FixedOffset>> {
        self.updated.as_deref().and_then(|s| parse_date_string(s, tz))
    }
}

/// At least one line must read as `key: value` with a plain identifier key
fn looks_like_yaml(block: &str) -> bool {
    block.lines().any(|line| {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return false;
        }
        let Some(colon_pos) = trimmed.find(':') else {
            return false;
        };
        let key = &trimmed[..colon_pos];
        let is_valid_key = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            && !matches!(key, "http" | "https" | "ftp" | "mailto");
        let after_colon = &trimmed[colon_pos + 1..];
        is_valid_key && (after_colon.is_empty() || after_colon.starts_with(' '))
    })
}

/// Parse a date string in the formats content authors actually write
pub fn parse_date_string(s: &str, tz: Option<Tz>) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }

    let datetime_formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return zoned(dt, tz);
        }
    }

    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return zoned(d.and_hms_opt(0, 0, 0)?, tz);
        }
    }

    None
}

fn zoned(dt: NaiveDateTime, tz: Option<Tz>) -> Option<DateTime<FixedOffset>> {
    match tz {
        Some(tz) => tz
            .from_local_datetime(&dt)
            .earliest()
            .map(|d| d.fixed_offset()),
        None => Local
            .from_local_datetime(&dt)
            .earliest()
            .map(|d| d.fixed_offset()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yaml_frontmatter() {
        let content = r#"---
title: Restoring the Hunt Panel
date: 2024-01-15 10:30:00
category: news
author: Marie Dupont
tags:
  - conservation
  - wool
---

This is the content.
"#;

        let (fm, remaining) = FrontMatter::parse(content).unwrap();
        assert_eq!(fm.title.as_deref(), Some("Restoring the Hunt Panel"));
        assert_eq!(fm.category.as_deref(), Some("news"));
        assert_eq!(fm.author.as_deref(), Some("Marie Dupont"));
        assert_eq!(fm.tags, vec!["conservation", "wool"]);
        assert!(fm.published);
        assert!(remaining.contains("This is the content."));
    }

    #[test]
    fn test_parse_json_frontmatter() {
        let content = r#"{"title": "Open Day {2024}", "tags": ["a", "b"]}

This is content.
"#;

        let (fm, remaining) = FrontMatter::parse(content).unwrap();
        assert_eq!(fm.title.as_deref(), Some("Open Day {2024}"));
        assert_eq!(fm.tags, vec!["a", "b"]);
        assert!(remaining.contains("This is content."));
    }

    #[test]
    fn test_parse_semicolon_json_frontmatter() {
        let content = ";;;\n\"title\": \"Workshop\"\n;;;\nBody";
        let (fm, remaining) = FrontMatter::parse(content).unwrap();
        assert_eq!(fm.title.as_deref(), Some("Workshop"));
        assert_eq!(remaining, "Body");
    }

    #[test]
    fn test_sponsor_and_tapestry_fields() {
        let content = r#"---
title: Atelier Lainier
tier: Gold
website: https://atelier.example.com
year: 1892
images: panel.jpg
order: 2
---
"#;
        let (fm, _) = FrontMatter::parse(content).unwrap();
        assert_eq!(fm.tier.as_deref(), Some("Gold"));
        assert_eq!(fm.year.as_deref(), Some("1892"));
        assert_eq!(fm.images, vec!["panel.jpg"]);
        assert_eq!(fm.order, Some(2));
    }

    #[test]
    fn test_parse_date() {
        let fm = FrontMatter {
            date: Some("2024-01-15 10:30:00".to_string()),
            ..Default::default()
        };
        let dt = fm.parse_date(None).unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2024-01-15 10:30");

        assert!(parse_date_string("2024/03/02", None).is_some());
        assert!(parse_date_string("2024-03-02T08:00:00+01:00", None).is_some());
        assert!(parse_date_string("last tuesday", None).is_none());
    }

    #[test]
    fn test_naive_dates_use_site_timezone() {
        let paris: Tz = "Europe/Paris".parse().unwrap();
        let dt = parse_date_string("2024-07-01 12:00", Some(paris)).unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-07-01T12:00:00+02:00");

        let kiritimati: Tz = "Pacific/Kiritimati".parse().unwrap();
        let dt = parse_date_string("2024-01-15", Some(kiritimati)).unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 14 * 3600);

        // An explicit offset wins over the site timezone
        let dt = parse_date_string("2024-03-02T08:00:00+01:00", Some(paris)).unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 3600);
    }

    #[test]
    fn test_unquoted_yaml_date_is_read() {
        let (fm, _) = FrontMatter::parse("---\ntitle: x\ndate: 2023-05-30\n---\n").unwrap();
        let dt = fm.parse_date(None).unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2023-05-30");
    }

    #[test]
    fn test_markdown_separator_not_yaml() {
        let content = r#"
---

A list of threads:
- Madder red
- Woad blue

---
More content here.
"#;

        let (fm, remaining) = FrontMatter::parse(content).unwrap();
        assert_eq!(fm.title, None);
        assert!(remaining.contains("A list of threads"));
    }

    #[test]
    fn test_content_with_url_not_yaml() {
        let content = r#"
---

See https://example.com/path and http://test.com

---
More content.
"#;

        let (fm, remaining) = FrontMatter::parse(content).unwrap();
        assert_eq!(fm.title, None);
        assert!(remaining.contains("https://example.com"));
    }

    #[test]
    fn test_malformed_yaml_is_kept_as_body() {
        let content = "---\ntitle: [unclosed\n---\nBody";
        let (fm, remaining) = FrontMatter::parse(content).unwrap();
        assert_eq!(fm.title, None);
        assert!(remaining.starts_with("---"));
    }

    #[test]
    fn test_no_frontmatter() {
        let (fm, remaining) = FrontMatter::parse("Just text").unwrap();
        assert!(fm.title.is_none());
        assert_eq!(remaining, "Just text");
    }
}
