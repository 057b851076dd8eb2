//! Initialize a new site

use anyhow::{bail, Result};
use std::fs;
use std::path::Path;

use crate::content::loader::{NEWS_DIR, PAGES_DIR, SPONSORS_DIR, TAPESTRIES_DIR, TEAM_DIR};
use crate::CONFIG_FILE;

const CONFIG_TEMPLATE: &str = r#"# Site
title: Heritage Tapestries
subtitle: ''
description: A community project restoring and documenting historic tapestries.
keywords:
  - tapestry
  - heritage
author: Heritage Tapestries Team
language: en
timezone: ''

# URL
url: http://example.com
root: /

# Directory
content_dir: content
public_dir: public
static_dir: static
media_dir: media

# Writing
render_drafts: false
future: false
excerpt_length: 200
external_link:
  enable: true
  exclude: []

# Listings
home_news_count: 3
per_page: 10
feed_limit: 20

menu:
  Home: /
  News: /news/
  Tapestries: /tapestries/
  Team: /team/
  Sponsors: /sponsors/
  Contact: /contact/

# Newsletter (MailerLite). The API key is read from MAILERLITE_API_KEY.
newsletter:
  api_url: https://connect.mailerlite.com/api
  group_id:
  api_key_env: MAILERLITE_API_KEY
  timeout_secs: 10

# Contact form (Resend). The API key is read from RESEND_API_KEY.
contact:
  api_url: https://api.resend.com
  from: Website <noreply@example.com>
  to: []
  subject_prefix: '[Contact]'
  api_key_env: RESEND_API_KEY
  timeout_secs: 10

# Media sync
media:
  include:
    - '**/*'
  exclude:
    - '**/.DS_Store'
    - '**/Thumbs.db'
"#;

const ENV_TEMPLATE: &str = "MAILERLITE_API_KEY=\nRESEND_API_KEY=\n";

/// Sample files, one per collection
fn samples(date: &str) -> Vec<(String, String)> {
    vec![
        (
            format!("{}/welcome.md", NEWS_DIR),
            format!(
                r#"---
title: Welcome to the project
date: {}
category: news
tags: [announcement]
featured: true
---

The project website is live. Follow our progress here.

<!-- more -->

Each month we will share news from the workshop, upcoming events and
stories about the tapestries in our care.
"#,
                date
            ),
        ),
        (
            format!("{}/jane-doe.md", TEAM_DIR),
            r#"---
name: Jane Doe
role: Project lead
order: 1
links:
  Website: https://example.com
---

Jane coordinates the conservation work and the volunteer programme.
"#
            .to_string(),
        ),
        (
            format!("{}/local-museum.md", SPONSORS_DIR),
            r#"---
name: Local Museum
tier: gold
website: https://example.com
---

Hosts the workshop and lends its archive.
"#
            .to_string(),
        ),
        (
            format!("{}/harvest-scene.md", TAPESTRIES_DIR),
            r#"---
title: Harvest Scene
year: "c. 1750"
location: Town hall
dimensions: 2.1 m × 3.4 m
technique: Wool and silk, low-warp
featured: true
images: []
---

A large verdure with a harvest scene, restored in 2024.
"#
            .to_string(),
        ),
        (
            format!("{}/about.md", PAGES_DIR),
            r#"---
title: About
---

We are a group of weavers, conservators and historians.
"#
            .to_string(),
        ),
        (
            "contact.md".to_string(),
            "Questions about the project or want to volunteer? Write to us.\n".to_string(),
        ),
    ]
}

/// Initialize a new site in the given directory
pub fn init_site(target_dir: &Path) -> Result<()> {
    if target_dir.join(CONFIG_FILE).exists() {
        bail!("{} already exists in {:?}", CONFIG_FILE, target_dir);
    }

    fs::create_dir_all(target_dir)?;
    for dir in ["static", "media"] {
        fs::create_dir_all(target_dir.join(dir))?;
    }

    fs::write(target_dir.join(CONFIG_FILE), CONFIG_TEMPLATE)?;
    let env_path = target_dir.join(".env.example");
    if !env_path.exists() {
        fs::write(env_path, ENV_TEMPLATE)?;
    }

    let content_dir = target_dir.join("content");
    let date = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    for (relative, body) in samples(&date) {
        let path = content_dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        if !path.exists() {
            fs::write(&path, body)?;
        }
    }

    tracing::info!("Initialized site in {:?}", target_dir);
    Ok(())
}
