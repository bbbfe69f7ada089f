//! Key-value document store.
//!
//! The sync pipeline only needs `get`/`put`/`delete` and a cursor-paged
//! `list`, so any backend that offers those can hold the generated documents
//! and the exposure settings.

use serde::Deserialize;
use tracing::info;

use crate::{Error, ErrorContext};

pub mod cloudflare;
pub mod memory;
pub mod sqlite;

pub const DEFAULT_LIST_LIMIT: usize = 1000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub prefix: Option<String>,
    pub limit: Option<usize>,
    pub cursor: Option<String>,
}

impl ListOptions {
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..Default::default()
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ListKey {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListResult {
    pub keys: Vec<ListKey>,
    pub list_complete: bool,
    pub cursor: Option<String>,
}

pub trait Store: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send;

    fn put(&self, key: &str, value: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn delete(&self, key: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn list(
        &self,
        options: ListOptions,
    ) -> impl Future<Output = Result<ListResult, Self::Error>> + Send;
}

/// Every key under `prefix`, following cursors to the end.
pub async fn list_all<S: Store>(store: &S, prefix: Option<&str>) -> Result<Vec<String>, S::Error> {
    let mut names = Vec::new();
    let mut cursor = None;
    loop {
        let page = store
            .list(ListOptions {
                prefix: prefix.map(ToOwned::to_owned),
                limit: Some(DEFAULT_LIST_LIMIT),
                cursor,
            })
            .await?;
        names.extend(page.keys.into_iter().map(|key| key.name));
        match page.cursor {
            Some(next) if !page.list_complete => cursor = Some(next),
            _ => break,
        }
    }
    Ok(names)
}

/// Deletes every key in the store and returns how many were removed.
pub async fn clear_all<S: Store>(store: &S) -> Result<usize, S::Error> {
    let keys = list_all(store, None).await?;
    for key in &keys {
        store.delete(key).await?;
    }
    info!(count = keys.len(), "cleared store");
    Ok(keys.len())
}

/// Keys removed by [`clear_stores`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cleared {
    pub documents: usize,
    pub settings: usize,
}

/// Empties the document store and, unless `keep_settings`, the exposure
/// settings store.
pub async fn clear_stores<S: Store, P: Store>(
    context: &ErrorContext,
    content: &S,
    settings: &P,
    keep_settings: bool,
) -> Result<Cleared, Error> {
    let documents = clear_all(content).await.map_err(|e| context.store(e))?;
    let settings = if keep_settings {
        0
    } else {
        clear_all(settings).await.map_err(|e| context.store(e))?
    };
    Ok(Cleared {
        documents,
        settings,
    })
}
