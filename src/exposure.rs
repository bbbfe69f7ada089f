//! Exposure policy: which collections, fields and pages reach the output.
//!
//! The policy is one JSON document stored under [`SETTINGS_KEY`]. A sync run
//! loads it once and queries the snapshot; anything without an explicit
//! `true` is hidden.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    kv::Store,
    webflow::{CollectionField, CollectionSchema},
};

pub const SETTINGS_KEY: &str = "settings";

/// Only a literal JSON `true` counts; strings, numbers and malformed values read as `false`.
fn exactly_true<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(matches!(Value::deserialize(deserializer)?, Value::Bool(true)))
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldPolicy {
    #[serde(default, deserialize_with = "exactly_true")]
    pub include: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionPolicy {
    #[serde(default, deserialize_with = "exactly_true")]
    pub is_visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Keyed by field id.
    #[serde(default)]
    pub fields: IndexMap<String, FieldPolicy>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PagePolicy {
    #[serde(default, deserialize_with = "exactly_true")]
    pub is_visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "exactly_true")]
    pub is_optional: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ExposureConfig {
    #[serde(default)]
    pub collections: IndexMap<String, CollectionPolicy>,
    #[serde(default)]
    pub pages: IndexMap<String, PagePolicy>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

impl ExposureConfig {
    /// Parses a stored policy; malformed JSON yields the empty policy.
    pub fn parse(raw: &str) -> Self {
        serde_json::from_str(raw)
            .inspect_err(|error| warn!(%error, "malformed exposure settings, nothing is exposed"))
            .unwrap_or_default()
    }

    pub fn is_collection_exposed(&self, collection_id: &str) -> bool {
        self.collection_config(collection_id)
            .is_some_and(|policy| policy.is_visible)
    }

    pub fn collection_config(&self, collection_id: &str) -> Option<&CollectionPolicy> {
        self.collections.get(collection_id)
    }

    pub fn is_field_exposed(&self, collection_id: &str, field_id: &str) -> bool {
        self.collection_config(collection_id)
            .and_then(|policy| policy.fields.get(field_id))
            .is_some_and(|field| field.include)
    }

    pub fn field_display_name<'a>(
        &'a self,
        collection_id: &str,
        field_id: &str,
        original: &'a str,
    ) -> &'a str {
        self.collection_config(collection_id)
            .and_then(|policy| policy.fields.get(field_id))
            .and_then(|field| non_empty(&field.display_name))
            .unwrap_or(original)
    }

    /// Keeps the fields (keyed by slug) whose id-keyed policy entry includes them,
    /// applying display name and description overrides.
    pub fn filter_exposed_fields(
        &self,
        collection_id: &str,
        fields: &IndexMap<String, CollectionField>,
    ) -> IndexMap<String, CollectionField> {
        let Some(policy) = self.collection_config(collection_id) else {
            return IndexMap::new();
        };
        fields
            .iter()
            .filter_map(|(slug, field)| {
                let field_policy = policy.fields.get(&field.id).filter(|f| f.include)?;
                let mut exposed = field.clone();
                if let Some(name) = non_empty(&field_policy.display_name) {
                    exposed.display_name = name.to_owned();
                }
                if let Some(description) = non_empty(&field_policy.description) {
                    exposed.description = Some(description.to_owned());
                }
                Some((slug.clone(), exposed))
            })
            .collect()
    }

    /// Keeps the item data whose key is included, either directly or through the
    /// schema field with that slug.
    pub fn filter_exposed_item_data(
        &self,
        collection_id: &str,
        item_data: &IndexMap<String, Value>,
        schema: &CollectionSchema,
    ) -> IndexMap<String, Value> {
        let Some(policy) = self.collection_config(collection_id) else {
            return IndexMap::new();
        };
        let included = |key: &str| policy.fields.get(key).is_some_and(|f| f.include);
        item_data
            .iter()
            .filter(|(slug, _)| {
                included(slug)
                    || schema
                        .fields
                        .iter()
                        .find(|field| &field.slug == *slug)
                        .is_some_and(|field| included(&field.id))
            })
            .map(|(slug, value)| (slug.clone(), value.clone()))
            .collect()
    }

    pub fn page_config(&self, page_id: &str) -> Option<&PagePolicy> {
        self.pages.get(page_id)
    }

    pub fn is_page_exposed(&self, page_id: &str) -> bool {
        self.page_config(page_id).is_some_and(|page| page.is_visible)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError<E: std::error::Error> {
    #[error("settings store error: {0}")]
    Store(E),
    #[error("failed to encode settings: {0}")]
    Encode(serde_json::Error),
}

/// Loads the policy snapshot for one run. A missing document is the empty policy.
pub async fn load_exposure_settings<S: Store>(store: &S) -> Result<ExposureConfig, S::Error> {
    let config = match store.get(SETTINGS_KEY).await? {
        Some(raw) => ExposureConfig::parse(&raw),
        None => ExposureConfig::default(),
    };
    debug!(
        collections = config.collections.len(),
        pages = config.pages.len(),
        "loaded exposure settings"
    );
    Ok(config)
}

async fn write_settings<S: Store>(
    store: &S,
    update: impl FnOnce(&mut ExposureConfig),
) -> Result<ExposureConfig, SettingsError<S::Error>> {
    let mut config = load_exposure_settings(store)
        .await
        .map_err(SettingsError::Store)?;
    update(&mut config);
    let encoded = serde_json::to_string(&config).map_err(SettingsError::Encode)?;
    store
        .put(SETTINGS_KEY, &encoded)
        .await
        .map_err(SettingsError::Store)?;
    Ok(config)
}

/// Replaces the collection half of the stored policy, keeping the page half.
pub async fn save_collection_settings<S: Store>(
    store: &S,
    collections: IndexMap<String, CollectionPolicy>,
) -> Result<ExposureConfig, SettingsError<S::Error>> {
    write_settings(store, |config| config.collections = collections).await
}

/// Replaces the page half of the stored policy, keeping the collection half.
pub async fn save_page_settings<S: Store>(
    store: &S,
    pages: IndexMap<String, PagePolicy>,
) -> Result<ExposureConfig, SettingsError<S::Error>> {
    write_settings(store, |config| config.pages = pages).await
}

#[cfg(test)]
mod tests {
    use maplit::hashmap;
    use serde_json::json;

    use super::*;
    use crate::{
        kv::memory::MemoryStore,
        webflow::{FieldType, Validations},
    };

    fn field(id: &str, slug: &str, name: &str) -> CollectionField {
        CollectionField {
            id: id.into(),
            slug: slug.into(),
            display_name: name.into(),
            description: None,
            field_type: FieldType::PlainText,
            required: false,
            validations: Validations::default(),
        }
    }

    fn config() -> ExposureConfig {
        serde_json::from_value(json!({
            "collections": {
                "visible": {
                    "isVisible": true,
                    "fields": {
                        "f-name": {"include": true, "displayName": "Full name"},
                        "f-bio": {"include": true},
                        "f-secret": {"include": false}
                    }
                },
                "stringly": {"isVisible": "true", "fields": {}},
                "hidden": {"isVisible": false, "fields": {}}
            },
            "pages": {
                "p1": {"isVisible": true, "isOptional": true}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_collection_visibility_requires_literal_true() {
        let config = config();
        assert!(config.is_collection_exposed("visible"));
        assert!(!config.is_collection_exposed("stringly"));
        assert!(!config.is_collection_exposed("hidden"));
        assert!(!config.is_collection_exposed("unknown"));
        assert!(config.is_page_exposed("p1"));
        assert!(config.page_config("p1").unwrap().is_optional);
    }

    #[test]
    fn test_field_queries() {
        let config = config();
        assert!(config.is_field_exposed("visible", "f-name"));
        assert!(!config.is_field_exposed("visible", "f-secret"));
        assert!(!config.is_field_exposed("unknown", "f-name"));
        assert_eq!(
            config.field_display_name("visible", "f-name", "Name"),
            "Full name"
        );
        assert_eq!(config.field_display_name("visible", "f-bio", "Bio"), "Bio");
    }

    #[test]
    fn test_filter_exposed_fields_applies_overrides() {
        let config = config();
        let fields: IndexMap<String, CollectionField> = [
            ("name".to_owned(), field("f-name", "name", "Name")),
            ("bio".to_owned(), field("f-bio", "bio", "Bio")),
            ("secret".to_owned(), field("f-secret", "secret", "Secret")),
            ("extra".to_owned(), field("f-extra", "extra", "Extra")),
        ]
        .into_iter()
        .collect();
        let exposed = config.filter_exposed_fields("visible", &fields);
        assert_eq!(exposed.keys().collect::<Vec<_>>(), vec!["name", "bio"]);
        assert_eq!(exposed["name"].display_name, "Full name");
        assert_eq!(exposed["bio"].display_name, "Bio");
        assert!(config.filter_exposed_fields("unknown", &fields).is_empty());
    }

    #[test]
    fn test_filter_exposed_item_data() {
        let config = config();
        let schema = CollectionSchema {
            id: "visible".into(),
            name: "People".into(),
            slug: "people".into(),
            singular_name: "Person".into(),
            last_updated: None,
            fields: vec![
                field("f-name", "name", "Name"),
                field("f-secret", "secret", "Secret"),
            ],
        };
        let data: IndexMap<String, Value> = [
            ("name".to_owned(), json!("Ada")),
            ("secret".to_owned(), json!("hunter2")),
            ("f-bio".to_owned(), json!("direct id key")),
            ("slug".to_owned(), json!("ada")),
        ]
        .into_iter()
        .collect();
        let exposed = config.filter_exposed_item_data("visible", &data, &schema);
        assert_eq!(
            exposed.into_iter().collect::<std::collections::HashMap<_, _>>(),
            hashmap! {
                "name".to_owned() => json!("Ada"),
                "f-bio".to_owned() => json!("direct id key"),
            }
        );
    }

    #[test]
    fn test_malformed_settings_expose_nothing() {
        assert_eq!(ExposureConfig::parse("{not json"), ExposureConfig::default());
        assert_eq!(
            ExposureConfig::parse(r#"{"collections": []}"#),
            ExposureConfig::default()
        );
    }

    #[tokio::test]
    async fn test_admin_writes_keep_the_other_half() {
        let store = MemoryStore::new();
        save_page_settings(
            &store,
            [(
                "p1".to_owned(),
                PagePolicy {
                    is_visible: true,
                    ..Default::default()
                },
            )]
            .into_iter()
            .collect(),
        )
        .await
        .unwrap();
        save_collection_settings(
            &store,
            [(
                "c1".to_owned(),
                CollectionPolicy {
                    is_visible: true,
                    ..Default::default()
                },
            )]
            .into_iter()
            .collect(),
        )
        .await
        .unwrap();
        let loaded = load_exposure_settings(&store).await.unwrap();
        assert!(loaded.is_page_exposed("p1"));
        assert!(loaded.is_collection_exposed("c1"));
        let raw = store.get(SETTINGS_KEY).await.unwrap().unwrap();
        assert!(raw.contains("\"isVisible\":true"));
    }
}
