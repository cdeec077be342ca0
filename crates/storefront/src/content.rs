//! Markdown-based content pages.
//!
//! Loads `pages/*.md` from the content directory at startup, parses the YAML
//! frontmatter and renders the body to HTML once. Pages are looked up by slug
//! (the file stem).

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use comrak::{Options, markdown_to_html};
use gray_matter::{Matter, ParsedEntity, engine::YAML};
use serde::Deserialize;

/// Metadata for static pages (about, faq, shipping, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct PageMeta {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub updated_at: Option<NaiveDate>,
}

/// A rendered page with metadata and HTML content.
#[derive(Debug, Clone)]
pub struct Page {
    pub slug: String,
    pub meta: PageMeta,
    pub content_html: String,
}

/// Content store that holds all loaded pages in memory.
#[derive(Debug, Clone, Default)]
pub struct ContentStore {
    pages: Arc<HashMap<String, Page>>,
}

impl ContentStore {
    /// Load all content from the filesystem.
    ///
    /// A missing `pages` directory yields an empty store. Individual pages
    /// that fail to parse are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the pages directory exists but cannot be read.
    pub fn load(content_dir: &Path) -> Result<Self, ContentError> {
        let pages = Self::load_pages(&content_dir.join("pages"))?;
        Ok(Self {
            pages: Arc::new(pages),
        })
    }

    /// Load all pages from the pages directory
    fn load_pages(dir: &Path) -> Result<HashMap<String, Page>, ContentError> {
        let mut pages = HashMap::new();

        if !dir.exists() {
            tracing::warn!("Pages directory does not exist: {:?}", dir);
            return Ok(pages);
        }

        let entries = std::fs::read_dir(dir).map_err(|e| ContentError::Io(e.to_string()))?;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "md") {
                match Self::load_page(&path) {
                    Ok(page) => {
                        tracing::info!("Loaded page: {}", page.slug);
                        pages.insert(page.slug.clone(), page);
                    }
                    Err(e) => {
                        tracing::error!("Failed to load page {:?}: {}", path, e);
                    }
                }
            }
        }

        Ok(pages)
    }

    /// Load a single page from a markdown file
    fn load_page(path: &Path) -> Result<Page, ContentError> {
        let content = std::fs::read_to_string(path).map_err(|e| ContentError::Io(e.to_string()))?;

        let slug = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ContentError::Parse("Invalid filename".to_string()))?
            .to_string();

        parse_page(slug, &content)
    }

    /// Get a page by slug
    #[must_use]
    pub fn get_page(&self, slug: &str) -> Option<&Page> {
        self.pages.get(slug)
    }

    /// Number of loaded pages
    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Parse frontmatter and render a page body.
fn parse_page(slug: String, content: &str) -> Result<Page, ContentError> {
    let matter = Matter::<YAML>::new();
    let parsed: ParsedEntity<PageMeta> = matter
        .parse(content)
        .map_err(|e| ContentError::Parse(format!("Failed to parse frontmatter: {e}")))?;
    let meta = parsed
        .data
        .ok_or_else(|| ContentError::Parse("Missing frontmatter".to_string()))?;

    Ok(Page {
        slug,
        meta,
        content_html: render_markdown(&parsed.content),
    })
}

/// Render markdown to HTML with GitHub Flavored Markdown support.
fn render_markdown(content: &str) -> String {
    let mut options = Options::default();

    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.header_ids = Some(String::new());

    // Content is authored in-repo; raw HTML stays escaped.
    options.render.r#unsafe = false;

    markdown_to_html(content, &options)
}

/// Content loading errors
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page_with_frontmatter() {
        let page = parse_page(
            "faq".to_string(),
            "---\ntitle: Frequently Asked Questions\ndescription: Answers\n---\n\n## Shipping\n\n| Method | Days |\n|---|---|\n| Standard | 5-7 |\n",
        )
        .unwrap();

        assert_eq!(page.slug, "faq");
        assert_eq!(page.meta.title, "Frequently Asked Questions");
        assert_eq!(page.meta.description.as_deref(), Some("Answers"));
        assert!(page.content_html.contains("<h2"));
        assert!(page.content_html.contains("<table>"));
    }

    #[test]
    fn test_parse_page_requires_frontmatter() {
        assert!(matches!(
            parse_page("about".to_string(), "# About\n"),
            Err(ContentError::Parse(_))
        ));
    }

    #[test]
    fn test_raw_html_is_not_rendered() {
        let page = parse_page(
            "x".to_string(),
            "---\ntitle: X\n---\n<script>alert(1)</script>\n",
        )
        .unwrap();
        assert!(!page.content_html.contains("<script>"));
    }

    #[test]
    fn test_load_missing_directory_is_empty() {
        let dir = std::env::temp_dir().join(format!("atelier-content-{}", uuid::Uuid::new_v4()));
        let store = ContentStore::load(&dir).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_pages_from_disk() {
        let dir = std::env::temp_dir().join(format!("atelier-content-{}", uuid::Uuid::new_v4()));
        let pages = dir.join("pages");
        std::fs::create_dir_all(&pages).unwrap();
        std::fs::write(pages.join("about.md"), "---\ntitle: About Us\n---\nHello").unwrap();
        std::fs::write(pages.join("broken.md"), "no frontmatter").unwrap();
        std::fs::write(pages.join("notes.txt"), "ignored").unwrap();

        let store = ContentStore::load(&dir).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_page("about").unwrap().meta.title, "About Us");
        assert!(store.get_page("broken").is_none());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
