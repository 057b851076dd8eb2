//! Markdown rendering

use anyhow::Result;
use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};
use std::collections::HashSet;

use crate::config::SiteConfig;
use crate::helpers::html_escape;

/// Marker separating an article's excerpt from the rest of its body
pub const MORE_MARKER: &str = "<!-- more -->";

/// Markdown renderer with heading anchors and external link handling
pub struct MarkdownRenderer {
    /// Host of the site itself; links elsewhere are external
    site_host: Option<String>,
    external_links: bool,
    exclude_hosts: Vec<String>,
}

impl MarkdownRenderer {
    /// Create a new markdown renderer
    pub fn new() -> Self {
        Self {
            site_host: None,
            external_links: false,
            exclude_hosts: Vec::new(),
        }
    }

    /// Create a renderer configured from the site settings
    pub fn for_site(config: &SiteConfig) -> Self {
        Self {
            site_host: Some(config.host().to_string()),
            external_links: config.external_link.enable,
            exclude_hosts: config.external_link.exclude.clone(),
        }
    }

    fn options() -> Options {
        // Front-matter is handled separately in FrontMatter::parse()
        Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_SMART_PUNCTUATION
            | Options::ENABLE_HEADING_ATTRIBUTES
    }

    /// Render markdown to HTML
    pub fn render(&self, markdown: &str) -> Result<String> {
        let mut events: Vec<Event> = Parser::new_ext(markdown, Self::options()).collect();

        assign_heading_ids(&mut events);

        if self.external_links {
            for event in events.iter_mut() {
                let opening_tag = match &*event {
                    Event::Start(Tag::Link {
                        dest_url, title, ..
                    }) if self.is_external(dest_url) => {
                        let title_attr = if title.is_empty() {
                            String::new()
                        } else {
                            format!(r#" title="{}""#, html_escape(title))
                        };
                        Some(format!(
                            r#"<a href="{}"{} target="_blank" rel="noopener">"#,
                            html_escape(dest_url),
                            title_attr
                        ))
                    }
                    _ => None,
                };
                if let Some(tag) = opening_tag {
                    *event = Event::Html(CowStr::from(tag));
                }
            }
        }

        let mut html_output = String::new();
        html::push_html(&mut html_output, events.into_iter());

        Ok(html_output)
    }

    fn is_external(&self, url: &str) -> bool {
        let Some(rest) = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
        else {
            return false;
        };
        let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
        if self.site_host.as_deref() == Some(host) {
            return false;
        }
        !self.exclude_hosts.iter().any(|h| h == host)
    }

    /// Parse excerpt from content (split by <!-- more -->)
    pub fn split_excerpt(content: &str) -> (Option<String>, String) {
        if let Some(pos) = content.find(MORE_MARKER) {
            let excerpt = content[..pos].trim().to_string();
            let remaining = content[pos + MORE_MARKER.len()..].trim().to_string();
            let full = format!("{}\n\n{}", excerpt, remaining);
            (Some(excerpt), full)
        } else {
            (None, content.to_string())
        }
    }

    /// Plain text of the first paragraph, cut at `max_chars` on a word boundary
    pub fn first_paragraph(markdown: &str, max_chars: usize) -> String {
        let mut text = String::new();
        let mut in_paragraph = false;

        for event in Parser::new_ext(markdown, Self::options()) {
            match event {
                Event::Start(Tag::Paragraph) => in_paragraph = true,
                Event::End(TagEnd::Paragraph) if in_paragraph => {
                    if !text.trim().is_empty() {
                        break;
                    }
                    in_paragraph = false;
                }
                Event::Text(t) | Event::Code(t) if in_paragraph => text.push_str(&t),
                Event::SoftBreak | Event::HardBreak if in_paragraph => text.push(' '),
                _ => {}
            }
        }

        truncate_words(text.trim(), max_chars)
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Give every heading without an explicit `{#id}` a unique slug id
fn assign_heading_ids(events: &mut [Event]) {
    let mut used: HashSet<String> = events
        .iter()
        .filter_map(|event| match event {
            Event::Start(Tag::Heading { id: Some(id), .. }) => Some(id.to_string()),
            _ => None,
        })
        .collect();
    let mut i = 0;

    while i < events.len() {
        if let Event::Start(Tag::Heading { id: None, .. }) = &events[i] {
            let mut text = String::new();
            let mut j = i + 1;
            while j < events.len() {
                match &events[j] {
                    Event::End(TagEnd::Heading(_)) => break,
                    Event::Text(t) | Event::Code(t) => text.push_str(t),
                    _ => {}
                }
                j += 1;
            }

            let base = match slug::slugify(&text) {
                s if s.is_empty() => "section".to_string(),
                s => s,
            };
            let mut anchor = base.clone();
            let mut n = 1;
            while used.contains(&anchor) {
                anchor = format!("{}-{}", base, n);
                n += 1;
            }
            used.insert(anchor.clone());

            if let Event::Start(Tag::Heading { id, .. }) = &mut events[i] {
                *id = Some(CowStr::from(anchor));
            }
            i = j;
        }
        i += 1;
    }
}

/// Cut text to at most `max_chars` characters, preferring a word boundary
pub fn truncate_words(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    // Leave room for the ellipsis
    let cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    let cut = match cut.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => &cut[..pos],
        _ => cut.as_str(),
    };
    format!("{}…", cut.trim_end_matches([',', '.', ';', ':', ' ']))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site_renderer() -> MarkdownRenderer {
        let config = SiteConfig {
            url: "https://tapestries.example.org".to_string(),
            ..Default::default()
        };
        MarkdownRenderer::for_site(&config)
    }

    #[test]
    fn test_render_basic_markdown() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("# Hello World\n\nThis is a test.").unwrap();
        assert!(html.contains(r#"<h1 id="hello-world">Hello World</h1>"#));
        assert!(html.contains("<p>This is a test.</p>"));
    }

    #[test]
    fn test_duplicate_headings_get_distinct_ids() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("## Wool\n\n## Wool\n\n## Silk {#silk-thread}").unwrap();
        assert!(html.contains(r#"id="wool""#));
        assert!(html.contains(r#"id="wool-1""#));
        assert!(html.contains(r#"id="silk-thread""#));
    }

    #[test]
    fn test_external_links_open_in_new_tab() {
        let html = site_renderer()
            .render("[museum](https://museum.example.com/x) and [home](https://tapestries.example.org/news/)")
            .unwrap();
        assert!(html.contains(
            r#"<a href="https://museum.example.com/x" target="_blank" rel="noopener">museum</a>"#
        ));
        assert!(html.contains(r#"<a href="https://tapestries.example.org/news/">home</a>"#));
    }

    #[test]
    fn test_relative_links_untouched() {
        let html = site_renderer().render("[team](/team/)").unwrap();
        assert!(html.contains(r#"<a href="/team/">team</a>"#));
    }

    #[test]
    fn test_split_excerpt() {
        let content = "This is excerpt.\n<!-- more -->\nThis is more content.";
        let (excerpt, full) = MarkdownRenderer::split_excerpt(content);
        assert_eq!(excerpt, Some("This is excerpt.".to_string()));
        assert!(full.contains("This is excerpt."));
        assert!(full.contains("This is more content."));
        assert!(!full.contains(MORE_MARKER));
    }

    #[test]
    fn test_first_paragraph() {
        let md = "# Title\n\nThe **loom** was\nrestored in spring.\n\nSecond paragraph.";
        assert_eq!(
            MarkdownRenderer::first_paragraph(md, 200),
            "The loom was restored in spring."
        );
        assert_eq!(MarkdownRenderer::first_paragraph(md, 12), "The loom…");
    }

    #[test]
    fn test_explicit_ids_are_not_reused() {
        let renderer = MarkdownRenderer::new();
        let html = renderer
            .render("## Dyes

## Natural dyes {#dyes}")
            .unwrap();
        assert!(html.contains(r#"<h2 id="dyes-1">Dyes</h2>"#));
        assert!(html.contains(r#"<h2 id="dyes">"#));
    }

    #[test]
    fn test_truncate_words_short_text_unchanged() {
        assert_eq!(truncate_words("short", 10), "short");
    }

    #[test]
    fn test_truncate_words_stays_within_limit() {
        let text = "abcdefghijklmnopqrstuvwxyz";
        let cut = truncate_words(text, 10);
        assert_eq!(cut, "abcdefghi…");
        assert_eq!(cut.chars().count(), 10);

        let cut = truncate_words("warp and weft threads", 9);
        assert_eq!(cut, "warp…");
        assert!(cut.chars().count() <= 9);
    }
}
