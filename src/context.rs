//! Per-run state shared by every stage of a sync.
//!
//! The context owns the API client, the pacing gateway and all caches, so two
//! contexts never observe each other's state.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use futures::future::join_all;
use indexmap::IndexMap;
use itertools::Itertools as _;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::{
    cache::TtlCache,
    fetch,
    gateway::{Gateway, PacingConfig},
    reference::ResolvedReference,
    warn_unit,
    webflow::{Api, CollectionSchema, Component, Error, Node},
};

pub struct SyncContext<A> {
    api: A,
    site_id: String,
    gateway: Gateway,
    components: OnceCell<IndexMap<String, Component>>,
    component_content: TtlCache<String, Arc<Vec<Node>>>,
    page_content: TtlCache<String, Arc<Vec<Node>>>,
    assets: TtlCache<String, String>,
    schemas: Mutex<HashMap<String, Arc<CollectionSchema>>>,
    references: Mutex<HashMap<String, ResolvedReference>>,
}

impl<A: Api> SyncContext<A> {
    pub fn new(api: A, site_id: impl Into<String>, pacing: PacingConfig, ttl: Duration) -> Self {
        Self {
            api,
            site_id: site_id.into(),
            gateway: Gateway::new(pacing),
            components: OnceCell::new(),
            component_content: TtlCache::new(ttl),
            page_content: TtlCache::new(ttl),
            assets: TtlCache::new(ttl),
            schemas: Mutex::new(HashMap::new()),
            references: Mutex::new(HashMap::new()),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Site components keyed by id, listed once per context.
    pub async fn components(&self) -> Result<&IndexMap<String, Component>, Error> {
        self.components
            .get_or_try_init(|| async {
                let components =
                    fetch::fetch_components(&self.api, &self.gateway, &self.site_id).await?;
                info!(count = components.len(), "loaded components");
                Ok(components
                    .into_iter()
                    .map(|component| (component.id.clone(), component))
                    .collect())
            })
            .await
    }

    pub async fn component_content(&self, component_id: &str) -> Result<Arc<Vec<Node>>, Error> {
        if let Some(nodes) = self.component_content.get(component_id) {
            return Ok(nodes);
        }
        let nodes = Arc::new(
            fetch::fetch_component_content(
                &self.api,
                &self.gateway,
                &self.site_id,
                component_id,
            )
            .await?,
        );
        self.component_content
            .insert(component_id.to_owned(), nodes.clone());
        Ok(nodes)
    }

    pub async fn page_content(&self, page_id: &str) -> Result<Arc<Vec<Node>>, Error> {
        if let Some(nodes) = self.page_content.get(page_id) {
            return Ok(nodes);
        }
        let nodes =
            Arc::new(fetch::fetch_page_content(&self.api, &self.gateway, page_id).await?);
        self.page_content.insert(page_id.to_owned(), nodes.clone());
        Ok(nodes)
    }

    /// Lists every site asset into the cache.
    pub async fn load_assets(&self) -> Result<usize, Error> {
        let assets = fetch::fetch_assets(&self.api, &self.gateway, &self.site_id).await?;
        let count = assets.len();
        self.assets.extend(assets.into_iter().filter_map(|asset| {
            let url = asset.hosted_url?;
            Some((asset.id, url))
        }));
        debug!(count, "loaded assets");
        Ok(count)
    }

    /// Fetches the assets among `asset_ids` that are not cached yet.
    ///
    /// Failures are recorded as unit warnings; the affected images are skipped
    /// when rendering.
    pub async fn prefetch_assets<'a>(&self, asset_ids: impl IntoIterator<Item = &'a str>) {
        let missing = asset_ids
            .into_iter()
            .unique()
            .filter(|id| !self.assets.contains(*id))
            .collect::<Vec<_>>();
        if missing.is_empty() {
            return;
        }
        debug!(count = missing.len(), "prefetching assets");
        let fetched = join_all(missing.iter().map(|id| async move {
            let result = self.gateway.call(|| self.api.get_asset(id)).await;
            (*id, result)
        }))
        .await;
        for (id, result) in fetched {
            match result {
                Ok(asset) => match asset.hosted_url {
                    Some(url) => self.assets.insert(id.to_owned(), url),
                    None => warn_unit!(Asset, "asset {id} has no hosted url"),
                },
                Err(error) => {
                    warn!(%error, asset_id = id, "failed to fetch asset");
                    warn_unit!(Asset, "failed to fetch asset {id}: {error}");
                }
            }
        }
    }

    pub fn asset_url(&self, asset_id: &str) -> Option<String> {
        self.assets.get(asset_id)
    }

    pub async fn schema(&self, collection_id: &str) -> Result<Arc<CollectionSchema>, Error> {
        if let Some(schema) = self
            .schemas
            .lock()
            .ok()
            .and_then(|schemas| schemas.get(collection_id).cloned())
        {
            return Ok(schema);
        }
        let raw = self
            .gateway
            .call(|| self.api.collection(collection_id))
            .await?;
        let schema = Arc::new(CollectionSchema::from(raw));
        if let Ok(mut schemas) = self.schemas.lock() {
            schemas.insert(collection_id.to_owned(), schema.clone());
        }
        Ok(schema)
    }

    pub fn cached_reference(&self, key: &str) -> Option<ResolvedReference> {
        self.references.lock().ok()?.get(key).cloned()
    }

    pub fn remember_reference(&self, key: String, reference: ResolvedReference) {
        if let Ok(mut references) = self.references.lock() {
            references.insert(key, reference);
        }
    }
}
