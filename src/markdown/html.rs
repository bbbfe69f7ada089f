//! HTML fragment to markdown.
//!
//! Navigation chrome (`nav`, `header`, `footer` and elements whose class names
//! mention navigation or footers) is dropped, as is any sibling whose text
//! repeats an earlier sibling's.

use std::{collections::HashSet, sync::LazyLock};

use tracing::warn;

use crate::warn_unit;

static BLANK_LINES: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\n{3,}").unwrap());
static EDGE_SPACES: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"(?m)^[ \t]+|[ \t]+$").unwrap());
static WHITESPACE: LazyLock<regex::Regex> = LazyLock::new(|| regex::Regex::new(r"\s+").unwrap());
/// A tag, or a tag cut off by the end of the fragment.
static TAG: LazyLock<regex::Regex> = LazyLock::new(|| regex::Regex::new(r"<[^>]*(>|$)").unwrap());

const SKIPPED_TAGS: &[&str] = &["nav", "header", "footer"];
const SKIPPED_CLASSES: &[&str] = &["nav", "navigation", "w-nav", "footer"];

#[derive(Debug, Clone, PartialEq)]
pub enum Html {
    Element {
        tag: String,
        class: String,
        href: Option<String>,
        src: Option<String>,
        alt: Option<String>,
        children: Vec<Html>,
    },
    Text(String),
}

impl From<html_parser::Node> for Html {
    fn from(value: html_parser::Node) -> Self {
        match value {
            html_parser::Node::Comment(_) => Html::Text(String::new()),
            html_parser::Node::Element(html_parser::Element {
                name,
                classes,
                mut attributes,
                children,
                ..
            }) => {
                let mut take = |name: &str| attributes.remove(name).flatten();
                Html::Element {
                    tag: name.to_lowercase(),
                    class: classes.join(" ").to_lowercase(),
                    href: take("href"),
                    src: take("src"),
                    alt: take("alt"),
                    children: children.into_iter().map(Into::into).collect(),
                }
            }
            html_parser::Node::Text(text) => {
                Html::Text(html_escape::decode_html_entities(&text).into_owned())
            }
        }
    }
}

pub fn parse(src: &str) -> Vec<Html> {
    match html_parser::Dom::parse(src) {
        Ok(dom) => dom.children.into_iter().map(Into::into).collect(),
        Err(e) => {
            warn!(%e, "failed to parse html");
            warn_unit!(Markup, "failed to parse html: {e}");
            vec![Html::Text(strip_tags(src))]
        }
    }
}

/// Text of a fragment the parser rejected, with every tag removed.
pub fn strip_tags(src: &str) -> String {
    let text = TAG.replace_all(src, " ");
    html_escape::decode_html_entities(text.trim()).into_owned()
}

pub fn text_content(out: &mut String, src: &[Html]) {
    for child in src {
        match child {
            Html::Text(t) => out.push_str(t),
            Html::Element { children, .. } => text_content(out, children),
        }
    }
}

impl Html {
    fn text(&self) -> String {
        let mut out = String::new();
        text_content(&mut out, std::slice::from_ref(self));
        out
    }

    fn is_chrome(&self) -> bool {
        match self {
            Html::Element { tag, class, .. } => {
                SKIPPED_TAGS.contains(&tag.as_str())
                    || SKIPPED_CLASSES.iter().any(|name| class.contains(name))
            }
            Html::Text(_) => false,
        }
    }
}

fn render_children(out: &mut String, children: &[Html]) {
    let mut seen = HashSet::new();
    for child in children {
        let text = child.text();
        if !text.trim().is_empty() && !seen.insert(text) {
            continue;
        }
        render(out, child);
    }
}

fn inner(children: &[Html]) -> String {
    let mut out = String::new();
    render_children(&mut out, children);
    out
}

fn render(out: &mut String, node: &Html) {
    let Html::Element {
        tag,
        href,
        src,
        alt,
        children,
        ..
    } = node
    else {
        if let Html::Text(text) = node {
            out.push_str(&WHITESPACE.replace_all(text, " "));
        }
        return;
    };
    if node.is_chrome() {
        return;
    }
    match tag.as_str() {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = tag[1..].parse::<usize>().unwrap_or(1);
            let content = inner(children);
            out.push_str(&format!("{} {}\n\n", "#".repeat(level), content.trim()));
        }
        "p" | "div" | "section" | "article" => {
            let content = inner(children);
            if !content.trim().is_empty() {
                out.push_str(content.trim());
                out.push_str("\n\n");
            }
        }
        "ul" | "ol" => {
            out.push_str(&format!("\n{}\n\n", inner(children).trim()));
        }
        "li" => {
            out.push_str(&format!("- {}\n", inner(children).trim()));
        }
        "a" => {
            let href = href.as_deref().filter(|h| !h.is_empty()).unwrap_or("#");
            out.push_str(&format!("[{}]({href})", inner(children).trim()));
        }
        "strong" | "b" => wrap(out, "**", &inner(children)),
        "em" | "i" => wrap(out, "*", &inner(children)),
        "code" => wrap(out, "`", &inner(children)),
        "br" => out.push('\n'),
        "hr" => out.push_str("\n---\n\n"),
        "img" => {
            if let Some(src) = src {
                out.push_str(&format!("![{}]({src})", alt.as_deref().unwrap_or_default()));
            }
        }
        "blockquote" => {
            let content = inner(children);
            for line in content.trim().lines() {
                out.push_str("> ");
                out.push_str(line);
                out.push('\n');
            }
            out.push('\n');
        }
        "script" | "style" | "noscript" | "svg" => {}
        _ => render_children(out, children),
    }
}

fn wrap(out: &mut String, delimiter: &str, content: &str) {
    let content = content.trim();
    if !content.is_empty() {
        out.push_str(delimiter);
        out.push_str(content);
        out.push_str(delimiter);
    }
}

/// Collapses runs of blank lines and trims the result.
pub fn tidy(markdown: &str) -> String {
    let markdown = EDGE_SPACES.replace_all(markdown, "");
    BLANK_LINES
        .replace_all(&markdown, "\n\n")
        .trim()
        .to_owned()
}

pub fn html_to_markdown(src: &str) -> String {
    let nodes = parse(src);
    let mut out = String::new();
    render_children(&mut out, &nodes);
    tidy(&out)
}
