//! Generated documents in the store.
//!
//! Page and collection documents are overwritten wholesale under two keys, with
//! and without a `.md` suffix. The `llms.txt` index is edited one `## Section`
//! at a time so that sections written by other runs survive.

use tracing::{debug, error};

use crate::kv::Store;

pub const INDEX_KEY: &str = "llms.txt";

pub const NOT_GENERATED: &str = "Content has not been generated yet. Please:\n\n1. Visit the admin interface at /\n2. Configure which collections and pages to expose\n3. Click 'Regenerate llms.txt' to generate the content\n";

fn split_lines(document: &str) -> Vec<&str> {
    if document.is_empty() {
        Vec::new()
    } else {
        document.split('\n').collect()
    }
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn collapse_blank_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> String {
    let mut out: Vec<&str> = Vec::new();
    for line in lines {
        if is_blank(line) && out.last().is_some_and(|last| is_blank(last)) {
            continue;
        }
        out.push(line);
    }
    out.join("\n")
}

/// Bounds of the `## {title}` section: heading line and first line after the section.
fn section_bounds(lines: &[&str], title: &str) -> Option<(usize, usize)> {
    let heading = format!("## {title}");
    let start = lines.iter().position(|line| *line == heading)?;
    let end = lines[start + 1..]
        .iter()
        .position(|line| line.starts_with("## "))
        .map(|offset| start + 1 + offset)
        .unwrap_or(lines.len());
    Some((start, end))
}

/// Replaces the body of section `title`, or appends the section when missing.
pub fn splice_section(document: &str, title: &str, content: &[String]) -> String {
    let lines = split_lines(document);
    let heading = format!("## {title}");
    let body = std::iter::once("")
        .chain(content.iter().map(String::as_str))
        .chain(std::iter::once(""));
    match section_bounds(&lines, title) {
        Some((start, end)) => collapse_blank_lines(
            lines[..=start]
                .iter()
                .copied()
                .chain(body)
                .chain(lines[end..].iter().copied()),
        ),
        None => {
            let separator = (!lines.is_empty()).then_some("");
            collapse_blank_lines(
                lines
                    .iter()
                    .copied()
                    .chain(separator)
                    .chain(std::iter::once(heading.as_str()))
                    .chain(body),
            )
        }
    }
}

/// Drops section `title` entirely; other sections are left as they are.
pub fn remove_section(document: &str, title: &str) -> String {
    let lines = split_lines(document);
    match section_bounds(&lines, title) {
        Some((start, end)) => collapse_blank_lines(
            lines[..start]
                .iter()
                .copied()
                .chain(lines[end..].iter().copied()),
        ),
        None => document.to_owned(),
    }
}

pub async fn update_llms_section<S: Store>(
    store: &S,
    title: &str,
    content: &[String],
) -> Result<(), S::Error> {
    let current = store.get(INDEX_KEY).await?.unwrap_or_default();
    let updated = splice_section(&current, title, content);
    store.put(INDEX_KEY, &updated).await?;
    debug!(title, lines = content.len(), "updated index section");
    Ok(())
}

/// Returns whether the section existed.
pub async fn remove_llms_section<S: Store>(store: &S, title: &str) -> Result<bool, S::Error> {
    let Some(current) = store.get(INDEX_KEY).await? else {
        return Ok(false);
    };
    let updated = remove_section(&current, title);
    if updated == current {
        return Ok(false);
    }
    store.put(INDEX_KEY, &updated).await?;
    debug!(title, "removed index section");
    Ok(true)
}

pub fn index_header(site_name: Option<&str>) -> String {
    let site_name = site_name.filter(|name| !name.is_empty());
    [
        format!("# {}", site_name.unwrap_or("Webflow Documentation")),
        String::new(),
        format!(
            "> This is the documentation for {}, providing information about our pages and content.",
            site_name.unwrap_or("our Webflow site")
        ),
        String::new(),
        "## Important Notes".to_owned(),
        String::new(),
        "- All content is automatically generated from our Webflow site".to_owned(),
        "- Each page and collection has a clean markdown version available at the same URL with .md appended".to_owned(),
        "- Content is updated whenever changes are published in Webflow".to_owned(),
        String::new(),
    ]
    .join("\n")
}

/// Writes the index header when no index exists yet. Returns whether it was created.
pub async fn ensure_index<S: Store>(store: &S, site_name: Option<&str>) -> Result<bool, S::Error> {
    if store.get(INDEX_KEY).await?.is_some() {
        return Ok(false);
    }
    store.put(INDEX_KEY, &index_header(site_name)).await?;
    Ok(true)
}

/// Stores `content` under `key` and `key.md`.
pub async fn write_document<S: Store>(store: &S, key: &str, content: &str) -> Result<(), S::Error> {
    store.put(key, content).await?;
    store.put(&format!("{key}.md"), content).await?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl Served {
    fn ok(content_type: &'static str, body: String) -> Self {
        Self {
            status: 200,
            content_type,
            body,
        }
    }

    fn not_found(body: impl Into<String>) -> Self {
        Self {
            status: 404,
            content_type: "text/plain; charset=utf-8",
            body: body.into(),
        }
    }
}

async fn lookup<S: Store>(store: &S, path: &str) -> Result<Served, S::Error> {
    if path.is_empty() || path == INDEX_KEY {
        return Ok(match store.get(INDEX_KEY).await? {
            Some(index) => Served::ok("text/plain; charset=utf-8", index),
            None => Served::not_found(NOT_GENERATED),
        });
    }
    let (prefix, missing) = if path.starts_with("docs/") {
        ("docs/", "Page not found")
    } else if path.starts_with("collections/") {
        ("collections/", "Collection not found")
    } else {
        return Ok(Served::not_found("Not found"));
    };
    let slug = path[prefix.len()..].trim_end_matches(".md");
    for key in [format!("{prefix}{slug}.md"), format!("{prefix}{slug}")] {
        if let Some(body) = store.get(&key).await? {
            return Ok(Served::ok("text/markdown; charset=utf-8", body));
        }
    }
    Ok(Served::not_found(missing))
}

/// Resolves a public path (`llms.txt`, `docs/{slug}`, `collections/{slug}`) to a response.
pub async fn serve<S: Store>(store: &S, path: &str) -> Served {
    let path = path.trim_start_matches('/');
    match lookup(store, path).await {
        Ok(served) => served,
        Err(e) => {
            error!(%e, path, "failed to read document");
            Served {
                status: 500,
                content_type: "text/plain; charset=utf-8",
                body: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::memory::MemoryStore;

    fn lines(content: &[&str]) -> Vec<String> {
        content.iter().map(|line| line.to_string()).collect()
    }

    #[test]
    fn test_splice_into_empty_document() {
        let spliced = splice_section("", "Pages", &lines(&["- [About](/docs/about.md)"]));
        assert_eq!(spliced, "## Pages\n\n- [About](/docs/about.md)\n");
        assert_eq!(spliced.matches("## Pages").count(), 1);
    }

    #[test]
    fn test_splice_replaces_in_place() {
        let document = "# Site\n\n## Pages\n\n- old\n\n## Collections\n\n- posts\n";
        let spliced = splice_section(document, "Pages", &lines(&["intro", "", "- new", ""]));
        assert_eq!(
            spliced,
            "# Site\n\n## Pages\n\nintro\n\n- new\n\n## Collections\n\n- posts\n"
        );
    }

    #[test]
    fn test_splice_is_idempotent() {
        let document = "# Site\n\n## Important Notes\n\n- generated\n\n## Collections\n\n- posts\n";
        let content = lines(&["The following pages:", "", "- [A](/docs/a.md)", ""]);
        let once = splice_section(document, "Pages", &content);
        let twice = splice_section(&once, "Pages", &content);
        assert_eq!(once, twice);
        assert_eq!(once.lines().count(), twice.lines().count());
        assert!(twice.contains("## Collections\n\n- posts"));
        assert!(twice.contains("## Important Notes\n\n- generated"));
    }

    #[test]
    fn test_remove_section() {
        let document = "# Site\n\n## Pages\n\n- a\n\n## Optional Pages\n\n- b\n\n## Collections\n\n- c\n";
        assert_eq!(
            remove_section(document, "Optional Pages"),
            "# Site\n\n## Pages\n\n- a\n\n## Collections\n\n- c\n"
        );
        assert_eq!(remove_section(document, "Missing"), document);
    }

    #[test]
    fn test_index_header() {
        let header = index_header(None);
        assert!(header.starts_with("# Webflow Documentation\n\n> This is the documentation for our Webflow site,"));
        assert!(index_header(Some("Acme")).starts_with("# Acme\n"));
    }

    #[tokio::test]
    async fn test_serve() {
        let store = MemoryStore::new();
        let missing = serve(&store, "/llms.txt").await;
        assert_eq!(missing.status, 404);
        assert_eq!(missing.body, NOT_GENERATED);

        ensure_index(&store, Some("Acme")).await.unwrap();
        update_llms_section(&store, "Pages", &lines(&["- [About](/docs/about.md)"]))
            .await
            .unwrap();
        write_document(&store, "docs/about", "# About").await.unwrap();

        let index = serve(&store, "/llms.txt").await;
        assert_eq!(index.status, 200);
        assert!(index.body.contains("## Important Notes"));
        assert!(index.body.contains("## Pages\n\n- [About](/docs/about.md)"));

        assert_eq!(serve(&store, "/docs/about.md").await.body, "# About");
        assert_eq!(serve(&store, "docs/about").await.status, 200);
        let collection = serve(&store, "/collections/none.md").await;
        assert_eq!((collection.status, collection.body.as_str()), (404, "Collection not found"));
    }
}
