//! Markdown output: HTML conversion, field rendering and document layout.

pub mod collection;
pub mod field;
pub mod html;
pub mod page;

/// Renders `key: value` frontmatter between `---` fences.
pub fn frontmatter<'a>(entries: impl IntoIterator<Item = (&'a str, String)>) -> Vec<String> {
    std::iter::once("---".to_owned())
        .chain(
            entries
                .into_iter()
                .map(|(key, value)| format!("{key}: {}", value.replace('\n', " "))),
        )
        .chain(std::iter::once("---".to_owned()))
        .collect()
}
