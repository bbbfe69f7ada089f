//! Inlines component instances into page content and renders the result.
//!
//! Component instances are expanded recursively with their property overrides
//! applied. Components that look like navigation, by name or by content, are
//! dropped along with everything inside them.

use futures::{FutureExt as _, future::BoxFuture, future::join_all};
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::{
    context::SyncContext,
    markdown::html::html_to_markdown,
    warn_unit,
    webflow::{Api, ImageRef, Node, OverrideKind, PropertyOverride},
};

pub const MAX_DEPTH: usize = 16;

const NAV_NAME_PATTERNS: &[&str] = &[
    "nav",
    "navigation",
    "header",
    "menu",
    "footer",
    "navbar",
    "mega-menu",
    "dropdown",
    "topbar",
    "menubar",
];

const NAV_CLASS_PATTERNS: &[&str] = &[
    r#"class="nav"#,
    r#"class="w-nav"#,
    r#"class="mega-nav"#,
    r#"class="footer"#,
    r#"class="menu"#,
    r#"class="navbar"#,
    r#"class="header"#,
    r#"class="top-bar"#,
    "nav-link",
    "nav-menu",
    "nav-bar",
    "navbar",
    "navigation",
    "mega-menu",
    "dropdown-menu",
    "menu-item",
];

const NAV_ELEMENT_PATTERNS: &[&str] = &[
    "<nav",
    "<header",
    "<footer",
    r#"role="navigation""#,
    r#"role="menubar""#,
    r#"role="menu""#,
];

const NAV_TEXT_PATTERNS: &[&str] = &["home", "about", "contact", "menu", "login", "register"];

pub fn is_navigation_name(name: &str) -> bool {
    let name = name.to_lowercase();
    NAV_NAME_PATTERNS.iter().any(|pattern| name.contains(pattern))
}

/// Scores text nodes by navigation markup (1) or navigation wording (0.5).
/// More than a fifth of all nodes scoring marks the content as navigation.
pub fn is_navigation_content(nodes: &[Node]) -> bool {
    let score: f64 = nodes
        .iter()
        .filter_map(Node::html)
        .map(|html| {
            let html = html.to_lowercase();
            let has = |patterns: &[&str]| patterns.iter().any(|p| html.contains(p));
            if has(NAV_CLASS_PATTERNS) || has(NAV_ELEMENT_PATTERNS) {
                1.0
            } else if has(NAV_TEXT_PATTERNS)
                || (html.contains("sign") && (html.contains("in") || html.contains("up")))
            {
                0.5
            } else {
                0.0
            }
        })
        .sum();
    score > 0.0 && score / nodes.len() as f64 > 0.2
}

/// Inserts ` key="value"` pairs before the first `>` of `html`.
pub fn merge_attributes(html: &str, attributes: &IndexMap<String, String>) -> String {
    if attributes.is_empty() {
        return html.to_owned();
    }
    let Some(end) = html.find('>') else {
        return html.to_owned();
    };
    let rendered = attributes
        .iter()
        .map(|(key, value)| {
            format!(
                r#"{key}="{}""#,
                html_escape::encode_double_quoted_attribute(value)
            )
        })
        .collect::<Vec<_>>()
        .join(" ");
    format!("{} {rendered}{}", &html[..end], &html[end..])
}

/// Substitutes override text into the nodes whose id matches an override.
pub fn apply_property_overrides(nodes: &[Node], overrides: &[PropertyOverride]) -> Vec<Node> {
    nodes
        .iter()
        .map(|node| {
            let found = node.id().and_then(|id| {
                overrides
                    .iter()
                    .find(|o| o.property_id == id)
                    .filter(|o| matches!(o.kind, OverrideKind::PlainText | OverrideKind::RichText))
            });
            match (node, found) {
                (Node::Text { id, attributes, .. }, Some(o)) => Node::Text {
                    id: id.clone(),
                    text: o.text.clone(),
                    attributes: attributes.clone(),
                },
                _ => node.clone(),
            }
        })
        .collect()
}

/// Asset ids of the image nodes among `nodes`, in order.
pub fn image_asset_ids(nodes: &[Node]) -> impl Iterator<Item = &str> {
    nodes.iter().filter_map(|node| match node {
        Node::Image {
            image: Some(ImageRef {
                asset_id: Some(asset_id),
                ..
            }),
            ..
        } => Some(asset_id.as_str()),
        _ => None,
    })
}

fn attr(value: &str) -> std::borrow::Cow<'_, str> {
    html_escape::encode_double_quoted_attribute(value)
}

/// HTML for a leaf node. Component instances and unknown nodes have none.
pub fn node_html<A: Api>(ctx: &SyncContext<A>, node: &Node) -> Option<String> {
    match node {
        Node::Text { attributes, .. } => {
            let html = node.html().filter(|html| !html.is_empty())?;
            Some(merge_attributes(html, attributes))
        }
        Node::Image {
            image, attributes, ..
        } => {
            let image = image.as_ref()?;
            let Some(asset_id) = image.asset_id.as_deref() else {
                debug!("skipping image without asset id");
                return None;
            };
            let Some(url) = ctx.asset_url(asset_id) else {
                warn!(asset_id, "image asset not found in cache");
                warn_unit!(Asset, "image asset {asset_id} not found");
                return None;
            };
            let alt = image.alt.as_deref().unwrap_or_default();
            Some(merge_attributes(
                &format!(r#"<img src="{}" alt="{}">"#, attr(&url), attr(alt)),
                attributes,
            ))
        }
        Node::Select {
            choices,
            attributes,
            ..
        } => {
            let options = choices
                .iter()
                .map(|choice| {
                    format!(
                        r#"<option value="{}">{}</option>"#,
                        attr(&choice.value),
                        html_escape::encode_text(&choice.text)
                    )
                })
                .collect::<String>();
            Some(merge_attributes(
                &format!("<select>{options}</select>"),
                attributes,
            ))
        }
        Node::TextInput {
            placeholder,
            attributes,
            ..
        } => Some(merge_attributes(
            &format!(
                r#"<input type="text" placeholder="{}">"#,
                attr(placeholder.as_deref().unwrap_or_default())
            ),
            attributes,
        )),
        Node::SubmitButton {
            value,
            waiting_text,
            attributes,
            ..
        } => Some(merge_attributes(
            &format!(
                r#"<button type="submit" data-waiting="{}">{}</button>"#,
                attr(waiting_text.as_deref().unwrap_or_default()),
                html_escape::encode_text(value.as_deref().unwrap_or("Submit"))
            ),
            attributes,
        )),
        Node::ComponentInstance { .. } | Node::Unknown => None,
    }
}

/// Renders a page's nodes to markdown blocks, expanding component instances.
pub async fn clean_content<A: Api>(ctx: &SyncContext<A>, nodes: &[Node]) -> Vec<String> {
    expand(ctx, nodes, &[]).await
}

fn expand<'a, A: Api>(
    ctx: &'a SyncContext<A>,
    nodes: &'a [Node],
    trail: &'a [String],
) -> BoxFuture<'a, Vec<String>> {
    async move {
        join_all(nodes.iter().map(|node| expand_node(ctx, node, trail)))
            .await
            .into_iter()
            .flatten()
            .collect()
    }
    .boxed()
}

async fn expand_node<A: Api>(ctx: &SyncContext<A>, node: &Node, trail: &[String]) -> Vec<String> {
    match node {
        Node::ComponentInstance {
            component_id,
            property_overrides,
            ..
        } => expand_component(ctx, component_id.as_deref(), property_overrides, trail).await,
        leaf => node_html(ctx, leaf)
            .map(|html| html_to_markdown(&html))
            .filter(|markdown| !markdown.is_empty())
            .into_iter()
            .collect(),
    }
}

async fn expand_component<A: Api>(
    ctx: &SyncContext<A>,
    component_id: Option<&str>,
    overrides: &[PropertyOverride],
    trail: &[String],
) -> Vec<String> {
    let Some(component_id) = component_id else {
        debug!("skipping component instance without id");
        return Vec::new();
    };
    if trail.iter().any(|ancestor| ancestor == component_id) {
        warn!(component_id, "skipping component nested inside itself");
        warn_unit!(Component, "skipped cyclic component {component_id}");
        return Vec::new();
    }
    if trail.len() >= MAX_DEPTH {
        warn!(component_id, depth = trail.len(), "component nesting too deep");
        warn_unit!(
            Component,
            "skipped component {component_id} nested deeper than {MAX_DEPTH}"
        );
        return Vec::new();
    }
    let components = match ctx.components().await {
        Ok(components) => components,
        Err(error) => {
            warn!(%error, component_id, "failed to list components");
            warn_unit!(Component, "failed to list components: {error}");
            return Vec::new();
        }
    };
    let Some(component) = components.get(component_id) else {
        debug!(component_id, "unknown component");
        return Vec::new();
    };
    if is_navigation_name(&component.name) {
        debug!(component_id, name = %component.name, "skipping navigation component");
        return Vec::new();
    }
    let content = match ctx.component_content(component_id).await {
        Ok(content) => content,
        Err(error) => {
            warn!(%error, component_id, "failed to fetch component content");
            warn_unit!(Component, "failed to fetch component {component_id}: {error}");
            return Vec::new();
        }
    };
    if content.is_empty() {
        return Vec::new();
    }
    let content = apply_property_overrides(&content, overrides);
    if is_navigation_content(&content) {
        debug!(component_id, name = %component.name, "skipping navigation-like component");
        return Vec::new();
    }
    ctx.prefetch_assets(image_asset_ids(&content)).await;
    let mut nested = trail.to_vec();
    nested.push(component_id.to_owned());
    expand(ctx, &content, &nested).await
}
