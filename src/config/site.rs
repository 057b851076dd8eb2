//! Site configuration (_config.yml)

use anyhow::{anyhow, Result};
use chrono::{DateTime, FixedOffset, Local, Utc};
use chrono_tz::Tz;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub keywords: Option<Vec<String>>,
    pub author: String,
    pub language: String,
    pub timezone: String,

    // URL
    pub url: String,
    pub root: String,

    // Directory
    pub content_dir: String,
    pub public_dir: String,
    pub static_dir: String,
    pub media_dir: String,

    // Writing
    pub render_drafts: bool,
    pub future: bool,
    pub excerpt_length: usize,
    #[serde(default)]
    pub external_link: ExternalLinkConfig,

    // Home page & listings
    pub home_news_count: usize,
    pub per_page: usize,
    pub feed_limit: usize,

    /// Navigation menu, in display order (label -> path)
    pub menu: IndexMap<String, String>,

    // Forms
    #[serde(default)]
    pub newsletter: NewsletterConfig,
    #[serde(default)]
    pub contact: ContactConfig,

    // Deployment
    #[serde(default)]
    pub media: MediaConfig,

    // Store any additional fields
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        let mut menu = IndexMap::new();
        for (label, path) in [
            ("Home", "/"),
            ("News", "/news/"),
            ("Tapestries", "/tapestries/"),
            ("Team", "/team/"),
            ("Sponsors", "/sponsors/"),
            ("Contact", "/contact/"),
        ] {
            menu.insert(label.to_string(), path.to_string());
        }

        Self {
            title: "Heritage Tapestries".to_string(),
            subtitle: String::new(),
            description: String::new(),
            keywords: None,
            author: "Heritage Tapestries Team".to_string(),
            language: "en".to_string(),
            timezone: String::new(),

            url: "http://example.com".to_string(),
            root: "/".to_string(),

            content_dir: "content".to_string(),
            public_dir: "public".to_string(),
            static_dir: "static".to_string(),
            media_dir: "media".to_string(),

            render_drafts: false,
            future: false,
            excerpt_length: 200,
            external_link: ExternalLinkConfig::default(),

            home_news_count: 3,
            per_page: 10,
            feed_limit: 20,

            menu,

            newsletter: NewsletterConfig::default(),
            contact: ContactConfig::default(),
            media: MediaConfig::default(),

            extra: HashMap::new(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: SiteConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make generation meaningless
    pub fn validate(&self) -> Result<()> {
        if self.per_page == 0 {
            return Err(anyhow!("per_page must be greater than zero"));
        }
        if !self.timezone.is_empty() {
            self.timezone
                .parse::<Tz>()
                .map_err(|e| anyhow!("Invalid timezone {:?}: {}", self.timezone, e))?;
        }
        Ok(())
    }

    /// The configured timezone; `None` means host local time
    pub fn tz(&self) -> Option<Tz> {
        if self.timezone.is_empty() {
            return None;
        }
        self.timezone.parse::<Tz>().ok()
    }

    /// Current time in the configured timezone (local time when unset)
    pub fn now(&self) -> DateTime<FixedOffset> {
        match self.tz() {
            Some(tz) => Utc::now().with_timezone(&tz).fixed_offset(),
            None => Local::now().fixed_offset(),
        }
    }

    /// Host part of the site URL, used to tell internal links from external ones
    pub fn host(&self) -> &str {
        let without_scheme = self
            .url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.url);
        without_scheme.split('/').next().unwrap_or_default()
    }
}

/// External link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalLinkConfig {
    pub enable: bool,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for ExternalLinkConfig {
    fn default() -> Self {
        Self {
            enable: true,
            exclude: Vec::new(),
        }
    }
}

/// Newsletter (MailerLite) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsletterConfig {
    pub api_url: String,
    pub group_id: Option<String>,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for NewsletterConfig {
    fn default() -> Self {
        Self {
            api_url: "https://connect.mailerlite.com/api".to_string(),
            group_id: None,
            api_key_env: "MAILERLITE_API_KEY".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Contact form (Resend) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactConfig {
    pub api_url: String,
    pub from: String,
    pub to: Vec<String>,
    pub subject_prefix: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.resend.com".to_string(),
            from: "Website <noreply@example.com>".to_string(),
            to: Vec::new(),
            subject_prefix: "[Contact]".to_string(),
            api_key_env: "RESEND_API_KEY".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Media sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            include: vec!["**/*".to_string()],
            exclude: vec!["**/.DS_Store".to_string(), "**/Thumbs.db".to_string()],
        }
    }
}
