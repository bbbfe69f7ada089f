use std::{collections::BTreeMap, convert::Infallible, ops::Bound};

use tokio::sync::Mutex;

use super::{DEFAULT_LIST_LIMIT, ListKey, ListOptions, ListResult, Store};

/// Ephemeral store for local runs and tests. The list cursor is the last key returned.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Default::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

impl Store for MemoryStore {
    type Error = Infallible;

    async fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        self.entries
            .lock()
            .await
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), Self::Error> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn list(&self, options: ListOptions) -> Result<ListResult, Self::Error> {
        let entries = self.entries.lock().await;
        let limit = options.limit.unwrap_or(DEFAULT_LIST_LIMIT).max(1);
        let lower = match &options.cursor {
            Some(cursor) => Bound::Excluded(cursor.clone()),
            None => Bound::Unbounded,
        };
        let prefix = options.prefix.as_deref().unwrap_or_default();
        let mut matching = entries
            .range((lower, Bound::Unbounded))
            .map(|(key, _)| key)
            .filter(|key| key.starts_with(prefix))
            .take(limit + 1)
            .cloned()
            .collect::<Vec<_>>();
        let list_complete = matching.len() <= limit;
        matching.truncate(limit);
        let cursor = (!list_complete).then(|| matching.last().cloned()).flatten();
        Ok(ListResult {
            keys: matching.into_iter().map(|name| ListKey { name }).collect(),
            list_complete,
            cursor,
        })
    }
}
