//! Built-in site templates using the Tera template engine
//!
//! Every template and the default stylesheet are embedded in the binary, so a
//! site only needs content and configuration to build.

use anyhow::Result;
use chrono::Datelike;
use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera};

use crate::config::SiteConfig;
use crate::helpers::{format_date, full_url_for, html_escape, root_url, strip_html, truncate};

/// Date format used when a template does not pass one
pub const DEFAULT_DATE_FORMAT: &str = "D MMMM YYYY";

/// Static assets shipped with the binary, as (output path, contents)
pub const ASSETS: &[(&str, &str)] = &[
    ("assets/style.css", include_str!("site/assets/style.css")),
    ("assets/forms.js", include_str!("site/assets/forms.js")),
];

/// Template renderer with the embedded site templates
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Create a new renderer with all templates loaded
    pub fn new(config: &SiteConfig) -> Result<Self> {
        let mut tera = Tera::default();

        // Same escaping as rendered markdown, so URLs keep their slashes
        tera.set_escape_fn(html_escape);

        tera.add_raw_templates(vec![
            ("layout.html", include_str!("site/layout.html")),
            ("home.html", include_str!("site/home.html")),
            ("news.html", include_str!("site/news.html")),
            ("article.html", include_str!("site/article.html")),
            ("team.html", include_str!("site/team.html")),
            ("sponsors.html", include_str!("site/sponsors.html")),
            ("tapestries.html", include_str!("site/tapestries.html")),
            ("tapestry.html", include_str!("site/tapestry.html")),
            ("contact.html", include_str!("site/contact.html")),
            ("page.html", include_str!("site/page.html")),
            ("form_result.html", include_str!("site/form_result.html")),
            ("404.html", include_str!("site/404.html")),
            // Partials
            (
                "partials/header.html",
                include_str!("site/partials/header.html"),
            ),
            (
                "partials/footer.html",
                include_str!("site/partials/footer.html"),
            ),
            (
                "partials/newsletter_form.html",
                include_str!("site/partials/newsletter_form.html"),
            ),
            (
                "partials/article_card.html",
                include_str!("site/partials/article_card.html"),
            ),
            (
                "partials/tapestry_card.html",
                include_str!("site/partials/tapestry_card.html"),
            ),
            (
                "partials/pager.html",
                include_str!("site/partials/pager.html"),
            ),
        ])?;

        // Register custom filters
        tera.register_filter("strip_html", strip_html_filter);
        tera.register_filter("truncate_chars", truncate_chars_filter);
        tera.register_filter("date_format", date_format_filter);

        let root = config.root.clone();
        tera.register_filter(
            "url_for",
            move |value: &tera::Value, _: &HashMap<String, tera::Value>| {
                let path = tera::try_get_value!("url_for", "value", String, value);
                Ok(tera::Value::String(root_url(&root, &path)))
            },
        );

        let site = config.clone();
        tera.register_filter(
            "full_url",
            move |value: &tera::Value, _: &HashMap<String, tera::Value>| {
                let path = tera::try_get_value!("full_url", "value", String, value);
                Ok(tera::Value::String(full_url_for(&site, &path)))
            },
        );

        Ok(Self { tera })
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(template_name, context)?)
    }

    /// Context shared by every page: site settings, the current path and
    /// empty defaults for the optional layout variables
    pub fn base_context(config: &SiteConfig, current_path: &str) -> Context {
        let mut context = Context::new();
        context.insert("config", &ConfigData::from_config(config));
        context.insert("current_path", current_path);
        context.insert("current_year", &config.now().year());
        context.insert("generator_version", env!("CARGO_PKG_VERSION"));
        context.insert("page_title", "");
        context.insert("page_description", "");
        context.insert("page_image", "");
        context
    }
}

/// Tera filter: strip HTML tags
fn strip_html_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("strip_html", "value", String, value);
    Ok(tera::Value::String(strip_html(&s)))
}

/// Tera filter: truncate by character count
fn truncate_chars_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("truncate_chars", "value", String, value);
    let length = match args.get("length") {
        Some(val) => tera::try_get_value!("truncate_chars", "length", usize, val),
        None => 150,
    };
    let omission = match args.get("omission") {
        Some(val) => tera::try_get_value!("truncate_chars", "omission", String, val),
        None => "…".to_string(),
    };

    Ok(tera::Value::String(truncate(&s, length, &omission)))
}

/// Tera filter: format an RFC 3339 timestamp with moment-style tokens
fn date_format_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("date_format", "value", String, value);
    let format = match args.get("format") {
        Some(val) => tera::try_get_value!("date_format", "format", String, val),
        None => DEFAULT_DATE_FORMAT.to_string(),
    };

    match chrono::DateTime::parse_from_rfc3339(&s) {
        Ok(date) => Ok(tera::Value::String(format_date(&date, &format))),
        // Not a timestamp: leave it alone
        Err(_) => Ok(tera::Value::String(s)),
    }
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct ConfigData {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub author: String,
    pub url: String,
    pub root: String,
    pub language: String,
    pub keywords: String,
    pub menu: Vec<MenuItem>,
}

impl ConfigData {
    pub fn from_config(config: &SiteConfig) -> Self {
        Self {
            title: config.title.clone(),
            subtitle: config.subtitle.clone(),
            description: config.description.clone(),
            author: config.author.clone(),
            url: config.url.clone(),
            root: config.root.clone(),
            language: config.language.clone(),
            keywords: config
                .keywords
                .as_ref()
                .map(|k| k.join(", "))
                .unwrap_or_default(),
            menu: config
                .menu
                .iter()
                .map(|(name, path)| MenuItem {
                    name: name.clone(),
                    path: path.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MenuItem {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaginationData {
    pub per_page: usize,
    /// Number of pages
    pub total: usize,
    /// 1-based current page
    pub current: usize,
    pub current_url: String,
    pub prev_link: Option<String>,
    pub next_link: Option<String>,
}

impl PaginationData {
    /// Pagination for page `current` of a listing rooted at `base`
    /// (`/news/` -> `/news/page/2/`, ...)
    pub fn new(base: &str, current: usize, total: usize, per_page: usize) -> Self {
        let link = |n: usize| {
            if n <= 1 {
                base.to_string()
            } else {
                format!("{}page/{}/", base, n)
            }
        };
        Self {
            per_page,
            total,
            current,
            current_url: link(current),
            prev_link: (current > 1).then(|| link(current - 1)),
            next_link: (current < total).then(|| link(current + 1)),
        }
    }
}
