//! URL helper functions

use crate::config::SiteConfig;

/// Generate a URL with the root path
///
/// # Examples
/// ```ignore
/// url_for(&config, "/css/style.css") // -> "/heritage/css/style.css"
/// ```
pub fn url_for(config: &SiteConfig, path: &str) -> String {
    root_url(&config.root, path)
}

/// Prefix `path` with the site root; absolute URLs pass through unchanged
pub fn root_url(root: &str, path: &str) -> String {
    if is_absolute_url(path) {
        return path.to_string();
    }

    let root = root.trim_end_matches('/');
    let path = path.trim_start_matches('/');

    if path.is_empty() {
        format!("{}/", root)
    } else {
        format!("{}/{}", root, path)
    }
}

/// Generate a full URL including the domain
///
/// # Examples
/// ```ignore
/// full_url_for(&config, "/team/") // -> "https://example.com/heritage/team/"
/// ```
pub fn full_url_for(config: &SiteConfig, path: &str) -> String {
    if is_absolute_url(path) {
        return path.to_string();
    }
    let base = config.url.trim_end_matches('/');
    format!("{}{}", base, url_for(config, path))
}

fn is_absolute_url(path: &str) -> bool {
    path.starts_with("http://")
        || path.starts_with("https://")
        || path.starts_with("//")
        || path.starts_with("mailto:")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> SiteConfig {
        SiteConfig {
            url: "https://example.com".to_string(),
            root: "/heritage/".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_url_for() {
        let config = test_config();
        assert_eq!(url_for(&config, "/css/style.css"), "/heritage/css/style.css");
        assert_eq!(url_for(&config, "team/"), "/heritage/team/");
        assert_eq!(url_for(&config, "/"), "/heritage/");
        assert_eq!(
            url_for(&config, "https://cdn.example.com/a.jpg"),
            "https://cdn.example.com/a.jpg"
        );
    }

    #[test]
    fn test_root_url_default_root() {
        assert_eq!(root_url("/", "/news/"), "/news/");
        assert_eq!(root_url("/", ""), "/");
    }

    #[test]
    fn test_full_url_for() {
        let config = test_config();
        assert_eq!(
            full_url_for(&config, "/team/"),
            "https://example.com/heritage/team/"
        );
    }
}
