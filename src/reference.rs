//! One-hop resolution of Reference and MultiReference fields.
//!
//! A resolved reference carries the referenced item's raw `fieldData`; its own
//! reference fields are never followed.

use futures::future::join_all;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    context::SyncContext,
    warn_unit,
    webflow::{Api, CollectionItem, CollectionSchema, Error, FieldType},
};

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedReference {
    pub id: String,
    pub collection_name: String,
    pub resolved: IndexMap<String, Value>,
}

impl From<ResolvedReference> for Value {
    fn from(reference: ResolvedReference) -> Self {
        let mut object = serde_json::Map::new();
        object.insert("id".into(), Value::String(reference.id));
        object.insert(
            "collectionName".into(),
            Value::String(reference.collection_name),
        );
        object.insert(
            "resolved".into(),
            Value::Object(reference.resolved.into_iter().collect()),
        );
        Value::Object(object)
    }
}

fn cache_key(collection_id: &str, item_id: &str) -> String {
    format!("{collection_id}:{item_id}")
}

/// Resolves one referenced item. Any failure is an expected absence.
pub async fn resolve_reference<A: Api>(
    ctx: &SyncContext<A>,
    collection_id: &str,
    item_id: &str,
) -> Option<ResolvedReference> {
    let key = cache_key(collection_id, item_id);
    if let Some(reference) = ctx.cached_reference(&key) {
        return Some(reference);
    }
    let fetched = async {
        let schema = ctx.schema(collection_id).await?;
        let item = ctx
            .gateway()
            .call(|| ctx.api().get_item(collection_id, item_id))
            .await?;
        Ok::<_, Error>(ResolvedReference {
            id: item_id.to_owned(),
            collection_name: schema.name.clone(),
            resolved: item.field_data,
        })
    }
    .await;
    match fetched {
        Ok(reference) => {
            ctx.remember_reference(key, reference.clone());
            Some(reference)
        }
        Err(error) => {
            warn!(%error, collection_id, item_id, "failed to resolve reference");
            warn_unit!(
                Reference,
                "unresolved reference {item_id} in collection {collection_id}"
            );
            None
        }
    }
}

fn reference_ids(value: &Value) -> Vec<&str> {
    match value {
        Value::Array(ids) => ids.iter().filter_map(Value::as_str).collect(),
        Value::String(id) => vec![id.as_str()],
        _ => Vec::new(),
    }
}

fn is_set(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Replaces the raw ids of an item's reference fields with resolved references.
///
/// A single reference that cannot be resolved keeps its raw id; unresolvable
/// members of a multi reference are dropped, keeping the order of the rest.
pub async fn resolve_reference_fields<A: Api>(
    ctx: &SyncContext<A>,
    mut item: CollectionItem,
    schema: &CollectionSchema,
) -> CollectionItem {
    for field in schema
        .fields
        .iter()
        .filter(|field| field.field_type.is_reference())
    {
        let Some(value) = item.field_data.get(&field.slug).filter(|v| is_set(v)) else {
            continue;
        };
        let Some(collection_id) = field.validations.collection_id() else {
            debug!(field = %field.slug, "reference field has no collection id");
            continue;
        };
        let resolved = match field.field_type {
            FieldType::Reference => {
                let Some(item_id) = value.as_str() else {
                    continue;
                };
                match resolve_reference(ctx, collection_id, item_id).await {
                    Some(reference) => Value::from(reference),
                    None => continue,
                }
            }
            _ => {
                let references = join_all(
                    reference_ids(value)
                        .into_iter()
                        .map(|item_id| resolve_reference(ctx, collection_id, item_id)),
                )
                .await;
                Value::Array(references.into_iter().flatten().map(Value::from).collect())
            }
        };
        item.field_data.insert(field.slug.clone(), resolved);
    }
    item
}
