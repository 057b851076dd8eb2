//! Create a new news article

use anyhow::{bail, Result};
use std::fs;
use std::path::PathBuf;

use crate::content::loader::NEWS_DIR;
use crate::content::Category;
use crate::Site;

/// Create `content/news/<slug>.md` with front matter; never overwrites
pub fn create_article(site: &Site, title: &str, category: Category) -> Result<PathBuf> {
    let slug = slug::slugify(title);
    if slug.is_empty() {
        bail!("Title {:?} does not produce a usable slug", title);
    }

    let target_dir = site.content_dir.join(NEWS_DIR);
    fs::create_dir_all(&target_dir)?;

    let file_path = target_dir.join(format!("{}.md", slug));
    if file_path.exists() {
        bail!("File already exists: {:?}", file_path);
    }

    let now = site.config.now();
    let content = format!(
        "---\ntitle: {}\ndate: {}\ncategory: {}\nauthor: {}\ntags: []\nfeatured: false\npublished: false\n---\n\nIntroduction.\n\n<!-- more -->\n\nThe rest of the article.\n",
        yaml_string(title),
        now.format("%Y-%m-%d %H:%M:%S"),
        category.as_str(),
        yaml_string(&site.config.author),
    );

    fs::write(&file_path, content)?;
    println!("Created: {:?}", file_path);

    Ok(file_path)
}

/// Quote a value so YAML reads it back as the same string
fn yaml_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Run the new command
pub fn run(site: &Site, title: &str, category: Option<&str>) -> Result<()> {
    let category = match category {
        Some(c) => c.parse::<Category>()?,
        None => Category::default(),
    };
    create_article(site, title, category)?;
    Ok(())
}
