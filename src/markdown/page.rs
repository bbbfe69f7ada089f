use super::frontmatter;
use crate::{exposure::PagePolicy, webflow::Page};

#[derive(Debug, Clone, PartialEq)]
pub struct PageMetadata {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub last_updated: String,
}

impl PageMetadata {
    pub fn new(page: &Page, last_updated: impl Into<String>) -> Self {
        Self {
            title: Some(page.title.as_str())
                .filter(|title| !title.is_empty())
                .unwrap_or("Untitled")
                .to_owned(),
            slug: page.document_slug().to_owned(),
            description: page.description().unwrap_or_default().to_owned(),
            last_updated: last_updated.into(),
        }
    }

    pub fn document_key(&self) -> String {
        format!("docs/{}", self.slug)
    }

    /// `llms.txt` bullet, preferring the policy's title and description overrides.
    pub fn index_entry(&self, policy: Option<&PagePolicy>, base_path: &str) -> String {
        let title = policy
            .and_then(|p| p.display_name.as_deref())
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.title);
        let description = policy
            .and_then(|p| p.description.as_deref())
            .filter(|d| !d.is_empty())
            .unwrap_or(&self.description);
        let entry = format!("- [{title}]({base_path}/docs/{}.md)", self.slug);
        if description.is_empty() {
            entry
        } else {
            format!("{entry}: {description}")
        }
    }
}

pub fn render_page(metadata: &PageMetadata, blocks: &[String]) -> String {
    frontmatter([
        ("title", metadata.title.clone()),
        ("slug", metadata.slug.clone()),
        ("description", metadata.description.clone()),
        ("last_updated", metadata.last_updated.clone()),
    ])
    .into_iter()
    .chain(std::iter::once(String::new()))
    .chain(blocks.iter().cloned())
    .collect::<Vec<_>>()
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webflow::Seo;

    fn page() -> Page {
        Page {
            id: "p1".into(),
            title: "About us".into(),
            slug: "about".into(),
            open_graph: Some(Seo {
                title: None,
                description: Some("Who we are".into()),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_render_page() {
        let metadata = PageMetadata::new(&page(), "2024-01-01T00:00:00.000Z");
        assert_eq!(metadata.document_key(), "docs/about");
        assert_eq!(
            render_page(&metadata, &["# Hello".into(), "World".into()]),
            "---\ntitle: About us\nslug: about\ndescription: Who we are\nlast_updated: 2024-01-01T00:00:00.000Z\n---\n\n# Hello\nWorld"
        );
    }

    #[test]
    fn test_index_entry() {
        let metadata = PageMetadata::new(&page(), "now");
        assert_eq!(
            metadata.index_entry(None, ""),
            "- [About us](/docs/about.md): Who we are"
        );
        let policy = PagePolicy {
            is_visible: true,
            display_name: Some("Company".into()),
            description: None,
            is_optional: false,
        };
        assert_eq!(
            metadata.index_entry(Some(&policy), "/llms"),
            "- [Company](/llms/docs/about.md): Who we are"
        );

        let bare = PageMetadata::new(
            &Page {
                id: "p2".into(),
                slug: "/".into(),
                ..Default::default()
            },
            "now",
        );
        assert_eq!(bare.index_entry(None, ""), "- [Untitled](/docs/index.md)");
    }
}
