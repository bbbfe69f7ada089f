//! Markdown rendering of CMS field values, one renderer per field type.

use serde_json::Value;

use super::html::html_to_markdown;
use crate::webflow::{CollectionField, FieldType};

pub type Renderer = fn(&Value, &CollectionField) -> String;

const NOT_SET: &str = "_Not set_";
const TITLE_KEYS: &[&str] = &["name", "title", "displayName", "heading", "label"];

pub fn renderer_for(field_type: &FieldType) -> Renderer {
    match field_type {
        FieldType::PlainText | FieldType::Email | FieldType::Phone => plain_text,
        FieldType::RichText => rich_text,
        FieldType::Date | FieldType::CreatedOn | FieldType::ModifiedOn => date,
        FieldType::Image => image,
        FieldType::MultiImage => multi_image,
        FieldType::Link | FieldType::Video | FieldType::File => link,
        FieldType::Boolean => boolean,
        FieldType::Select => select,
        FieldType::Reference => reference,
        FieldType::MultiReference => multi_reference,
        FieldType::Color => color,
        FieldType::Number => number,
        FieldType::Other(_) => fallback,
    }
}

/// Renders a possibly absent value; absent and `null` values are "not set".
pub fn render_field(value: Option<&Value>, field: &CollectionField) -> String {
    match value {
        None | Some(Value::Null) => NOT_SET.to_owned(),
        Some(value) => renderer_for(&field.field_type)(value, field),
    }
}

pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Strings as-is, everything else as compact JSON.
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn inline_json(value: &Value) -> String {
    format!("`{value}`")
}

fn str_at<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Best-guess title of a resolved reference's field data.
pub fn display_name_from_resolved(resolved: &Value) -> String {
    TITLE_KEYS
        .iter()
        .filter_map(|key| resolved.get(*key))
        .find(|value| truthy(value))
        .map(display)
        .unwrap_or_else(|| "Untitled Item".to_owned())
}

fn plain_text(value: &Value, _: &CollectionField) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => inline_json(other),
    }
}

fn rich_text(value: &Value, _: &CollectionField) -> String {
    match value {
        Value::String(html) => html_to_markdown(html),
        other => inline_json(other),
    }
}

fn date(value: &Value, _: &CollectionField) -> String {
    value
        .as_str()
        .and_then(|raw| chrono::DateTime::parse_from_rfc3339(raw).ok())
        .map(|date| {
            date.with_timezone(&chrono::Utc)
                .format("%-m/%-d/%Y %-I:%M:%S %p")
                .to_string()
        })
        .unwrap_or_else(|| display(value))
}

fn image(value: &Value, _: &CollectionField) -> String {
    let Some(url) = str_at(value, "url") else {
        return "_No image_".to_owned();
    };
    match str_at(value, "alt") {
        Some(alt) => format!("![{alt}]({url})\n\n*{alt}*"),
        None => format!("![Image]({url})"),
    }
}

fn multi_image(value: &Value, field: &CollectionField) -> String {
    match value {
        Value::Array(images) if !images.is_empty() => images
            .iter()
            .map(|img| image(img, field))
            .collect::<Vec<_>>()
            .join("\n\n"),
        Value::Array(_) => "_No images_".to_owned(),
        other => image(other, field),
    }
}

fn link(value: &Value, _: &CollectionField) -> String {
    let url = value
        .as_str()
        .filter(|s| !s.is_empty())
        .or_else(|| str_at(value, "url"));
    let Some(url) = url else {
        return "_No link_".to_owned();
    };
    let text = str_at(value, "text").unwrap_or(url);
    if url.starts_with("http") {
        format!("[{text}]({url})")
    } else {
        format!("`{url}`")
    }
}

fn boolean(value: &Value, _: &CollectionField) -> String {
    let mark = if truthy(value) { "✓ Yes" } else { "✗ No" };
    mark.to_owned()
}

fn select(value: &Value, field: &CollectionField) -> String {
    if !truthy(value) {
        return "_None selected_".to_owned();
    }
    match value {
        Value::Array(options) if options.is_empty() => "_No options selected_".to_owned(),
        Value::Array(options) => options
            .iter()
            .map(|option| match option {
                Value::String(id) => format!("- {}", field.validations.option_name(id)),
                other => format!("- {}", display(other)),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Value::String(id) => field.validations.option_name(id).to_owned(),
        other => display(other),
    }
}

fn reference(value: &Value, _: &CollectionField) -> String {
    if !truthy(value) {
        return "_No reference_".to_owned();
    }
    match value.get("resolved") {
        Some(resolved) if truthy(resolved) => display_name_from_resolved(resolved),
        _ => inline_json(value),
    }
}

fn multi_reference(value: &Value, _: &CollectionField) -> String {
    let Value::Array(references) = value else {
        return "_No references_".to_owned();
    };
    let lines = references
        .iter()
        .filter_map(|reference| reference.get("resolved").filter(|r| truthy(r)))
        .map(|resolved| format!("- {}", display_name_from_resolved(resolved)))
        .collect::<Vec<_>>();
    if lines.is_empty() {
        "_No valid references_".to_owned()
    } else {
        lines.join("\n")
    }
}

fn color(value: &Value, _: &CollectionField) -> String {
    if !truthy(value) {
        return "_No color_".to_owned();
    }
    let color = display(value);
    format!(
        "`{color}` <span style=\"display:inline-block;width:1em;height:1em;background:{color};border:1px solid #ccc;\"></span>"
    )
}

fn group_digits(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

/// en-US style number: thousands separators, at most three fraction digits.
pub fn format_number(n: f64) -> String {
    let sign = if n < 0.0 { "-" } else { "" };
    let fixed = format!("{:.3}", n.abs());
    let (int, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        format!("{sign}{}", group_digits(int))
    } else {
        format!("{sign}{}.{frac}", group_digits(int))
    }
}

fn number(value: &Value, _: &CollectionField) -> String {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) if i.unsigned_abs() < 1 << 53 => format_number(i as f64),
            Some(i) => i.to_string(),
            None => n.as_f64().map(format_number).unwrap_or_else(|| n.to_string()),
        },
        other => display(other),
    }
}

fn fallback(value: &Value, _: &CollectionField) -> String {
    if value.as_object().is_some_and(|object| object.is_empty()) {
        return "_Empty_".to_owned();
    }
    match serde_json::to_string_pretty(value) {
        Ok(pretty) => format!("```json\n{pretty}\n```"),
        Err(_) => inline_json(value),
    }
}
