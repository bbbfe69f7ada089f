//! Collection documents: frontmatter, a summary, then one section per item with
//! its fields grouped into tables.

use std::sync::LazyLock;

use indexmap::IndexMap;
use serde_json::Value;

use super::{
    field::{display, render_field, truthy},
    frontmatter,
};
use crate::webflow::{CollectionField, FieldType};

static NOT_SLUG: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"[^a-z0-9\s-]").unwrap());
static SPACES: LazyLock<regex::Regex> = LazyLock::new(|| regex::Regex::new(r"\s+").unwrap());

const TITLE_NAMES: &[&str] = &["name", "title", "heading", "label", "posttitle"];

/// URL slug of a collection document, derived from the collection name.
pub fn collection_slug(name: &str) -> String {
    let lower = name.to_lowercase();
    let kept = NOT_SLUG.replace_all(&lower, "");
    SPACES.replace_all(&kept, "-").into_owned()
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionMetadata {
    pub title: String,
    pub slug: String,
    pub name: String,
    pub singular_name: String,
    pub description: Option<String>,
    pub last_updated: String,
}

impl CollectionMetadata {
    pub fn document_key(&self) -> String {
        format!("collections/{}", self.slug)
    }

    pub fn index_entry(&self, item_count: usize, base_path: &str) -> String {
        let description = match self.description.as_deref().filter(|d| !d.is_empty()) {
            Some(description) => description.to_owned(),
            None => format!("Collection with {item_count} items"),
        };
        format!(
            "- [{}]({base_path}/collections/{}.md): {description}",
            self.title, self.slug
        )
    }
}

/// An item reduced to its exposed field data.
#[derive(Debug, Clone, PartialEq)]
pub struct ExposedItem {
    pub id: String,
    pub data: IndexMap<String, Value>,
}

/// Title of an item: a field named like a title, else the first non-description
/// text field, else its id.
pub fn item_title(item: &ExposedItem, fields: &IndexMap<String, CollectionField>) -> String {
    let with_field = || {
        item.data
            .iter()
            .filter(|(_, value)| truthy(value))
            .filter_map(|(key, value)| Some((key, value, fields.get(key)?)))
    };
    with_field()
        .find(|(_, _, field)| TITLE_NAMES.contains(&field.display_name.to_lowercase().as_str()))
        .or_else(|| {
            with_field().find(|(key, _, field)| {
                field.field_type.is_text() && !key.to_lowercase().contains("description")
            })
        })
        .map(|(_, value, _)| display(value))
        .unwrap_or_else(|| format!("Item {}", item.id))
}

#[derive(Default)]
struct Groups {
    basic: Vec<String>,
    media: Vec<String>,
    references: Vec<String>,
    metadata: Vec<String>,
    content: Vec<String>,
}

fn push_table(lines: &mut Vec<String>, title: &str, header: &str, rule: &str, rows: Vec<String>) {
    if rows.is_empty() {
        return;
    }
    lines.push(format!("### {title}"));
    lines.push(String::new());
    lines.push(header.to_owned());
    lines.push(rule.to_owned());
    lines.extend(rows);
    lines.push(String::new());
}

pub fn render_item(
    item: &ExposedItem,
    index: usize,
    total: usize,
    fields: &IndexMap<String, CollectionField>,
) -> String {
    let mut lines = vec![
        "---".to_owned(),
        String::new(),
        format!("## {}", item_title(item, fields)),
        String::new(),
        format!("*Item {} of {total}*", index + 1),
        String::new(),
    ];
    let mut groups = Groups::default();
    for (key, value) in &item.data {
        let Some(field) = fields.get(key) else {
            continue;
        };
        let rendered = render_field(Some(value), field);
        if field.field_type == FieldType::RichText {
            groups
                .content
                .push(format!("### {}\n\n{rendered}\n", field.display_name));
            continue;
        }
        let row = format!(
            "| {} | {} |",
            field.display_name,
            rendered.replace('\n', "<br>")
        );
        match field.field_type {
            FieldType::Image | FieldType::MultiImage | FieldType::Video => groups.media.push(row),
            FieldType::Reference | FieldType::MultiReference => groups.references.push(row),
            FieldType::Date | FieldType::CreatedOn | FieldType::ModifiedOn => {
                groups.metadata.push(row)
            }
            _ => groups.basic.push(row),
        }
    }
    push_table(
        &mut lines,
        "Basic Information",
        "| Field | Value |",
        "|-------|--------|",
        groups.basic,
    );
    push_table(
        &mut lines,
        "Media",
        "| Field | Content |",
        "|-------|---------|",
        groups.media,
    );
    push_table(
        &mut lines,
        "Related Items",
        "| Field | Reference |",
        "|-------|-----------|",
        groups.references,
    );
    push_table(
        &mut lines,
        "Metadata",
        "| Field | Value |",
        "|-------|--------|",
        groups.metadata,
    );
    if !groups.content.is_empty() {
        lines.push("### Content".to_owned());
        lines.push(String::new());
        lines.extend(groups.content);
    }
    lines.push("\n---\n".to_owned());
    lines.join("\n")
}

pub fn render_collection(
    metadata: &CollectionMetadata,
    items: &[ExposedItem],
    fields: &IndexMap<String, CollectionField>,
) -> String {
    let total = items.len();
    let summary = match metadata.description.as_deref().filter(|d| !d.is_empty()) {
        Some(description) => format!("> {description}"),
        None => format!("> This collection contains {total} {}.", metadata.name),
    };
    frontmatter([
        ("title", metadata.title.clone()),
        ("slug", metadata.slug.clone()),
        ("type", "collection".to_owned()),
        ("singular_name", metadata.singular_name.clone()),
        ("last_updated", metadata.last_updated.clone()),
        ("total_items", total.to_string()),
    ])
    .into_iter()
    .chain([
        String::new(),
        format!("# {}", metadata.title),
        String::new(),
        summary,
        String::new(),
    ])
    .chain(
        items
            .iter()
            .enumerate()
            .map(|(index, item)| render_item(item, index, total, fields)),
    )
    .collect::<Vec<_>>()
    .join("\n")
}
