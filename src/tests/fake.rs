use std::{collections::HashMap, sync::Mutex, time::Duration};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    context::SyncContext,
    gateway::PacingConfig,
    webflow::{
        Api, Asset, AssetsResponse, CollectionItem, CollectionSummary, CollectionsResponse,
        Component, ComponentsResponse, Error, ItemsResponse, Node, NodesResponse, Paced,
        PageRequest, Page, PagesResponse, Pagination, RawCollection, Site, SitesResponse,
    },
};

pub const SITE_ID: &str = "site1";

pub fn de<T: DeserializeOwned>(value: Value) -> T {
    serde_json::from_value(value).unwrap()
}

/// In-memory upstream. Every call is recorded as `operation:argument`.
#[derive(Default)]
pub struct FakeApi {
    pub sites: Vec<Site>,
    pub pages: Vec<Page>,
    pub page_nodes: HashMap<String, Vec<Node>>,
    pub components: Vec<Component>,
    pub component_nodes: HashMap<String, Vec<Node>>,
    pub collections: Vec<CollectionSummary>,
    pub schemas: HashMap<String, RawCollection>,
    pub items: HashMap<String, Vec<CollectionItem>>,
    pub assets: Vec<Asset>,
    pub calls: Mutex<Vec<String>>,
}

fn slice<T: Clone>(all: &[T], page: PageRequest) -> (Vec<T>, Option<Pagination>) {
    let items = all
        .iter()
        .skip(page.offset)
        .take(page.limit)
        .cloned()
        .collect();
    (
        items,
        Some(Pagination {
            limit: page.limit,
            offset: page.offset,
            total: all.len(),
        }),
    )
}

fn not_found(what: &str) -> Error {
    Error::Status {
        status: reqwest::StatusCode::NOT_FOUND,
        body: format!("{what} not found"),
    }
}

impl FakeApi {
    pub fn site(name: &str) -> Self {
        Self {
            sites: vec![de(serde_json::json!({"id": SITE_ID, "displayName": name}))],
            ..Default::default()
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self, prefix: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn into_context(self) -> SyncContext<Self> {
        let pacing = PacingConfig {
            min_delay_ms: 0,
            max_delay_ms: 0,
            page_delay_ms: 0,
            unit_delay_ms: 0,
            reset_buffer_ms: 0,
            ..Default::default()
        };
        SyncContext::new(self, SITE_ID, pacing, Duration::from_secs(3600))
    }
}

impl Api for FakeApi {
    async fn list_sites(&self) -> Result<Paced<SitesResponse>, Error> {
        self.record("list_sites".into());
        Ok(Paced::new(SitesResponse {
            sites: self.sites.clone(),
        }))
    }

    async fn list_pages(
        &self,
        site_id: &str,
        page: PageRequest,
    ) -> Result<Paced<PagesResponse>, Error> {
        self.record(format!("list_pages:{site_id}"));
        let (pages, pagination) = slice(&self.pages, page);
        Ok(Paced::new(PagesResponse { pages, pagination }))
    }

    async fn page_content(
        &self,
        page_id: &str,
        page: PageRequest,
    ) -> Result<Paced<NodesResponse>, Error> {
        self.record(format!("page_content:{page_id}"));
        let all = self.page_nodes.get(page_id).ok_or_else(|| not_found(page_id))?;
        let (nodes, pagination) = slice(all, page);
        Ok(Paced::new(NodesResponse { nodes, pagination }))
    }

    async fn list_collections(&self, site_id: &str) -> Result<Paced<CollectionsResponse>, Error> {
        self.record(format!("list_collections:{site_id}"));
        Ok(Paced::new(CollectionsResponse {
            collections: self.collections.clone(),
        }))
    }

    async fn collection(&self, collection_id: &str) -> Result<Paced<RawCollection>, Error> {
        self.record(format!("collection:{collection_id}"));
        self.schemas
            .get(collection_id)
            .cloned()
            .map(Paced::new)
            .ok_or_else(|| not_found(collection_id))
    }

    async fn list_items(
        &self,
        collection_id: &str,
        page: PageRequest,
    ) -> Result<Paced<ItemsResponse>, Error> {
        self.record(format!("list_items:{collection_id}"));
        let all = self.items.get(collection_id).cloned().unwrap_or_default();
        let (items, pagination) = slice(&all, page);
        Ok(Paced::new(ItemsResponse { items, pagination }))
    }

    async fn get_item(
        &self,
        collection_id: &str,
        item_id: &str,
    ) -> Result<Paced<CollectionItem>, Error> {
        self.record(format!("get_item:{collection_id}:{item_id}"));
        self.items
            .get(collection_id)
            .and_then(|items| items.iter().find(|item| item.id == item_id))
            .cloned()
            .map(Paced::new)
            .ok_or_else(|| not_found(item_id))
    }

    async fn list_components(
        &self,
        site_id: &str,
        page: PageRequest,
    ) -> Result<Paced<ComponentsResponse>, Error> {
        self.record(format!("list_components:{site_id}"));
        let (components, pagination) = slice(&self.components, page);
        Ok(Paced::new(ComponentsResponse {
            components,
            pagination,
        }))
    }

    async fn component_content(
        &self,
        _site_id: &str,
        component_id: &str,
        page: PageRequest,
    ) -> Result<Paced<NodesResponse>, Error> {
        self.record(format!("component_content:{component_id}"));
        let all = self
            .component_nodes
            .get(component_id)
            .ok_or_else(|| not_found(component_id))?;
        let (nodes, pagination) = slice(all, page);
        Ok(Paced::new(NodesResponse { nodes, pagination }))
    }

    async fn list_assets(
        &self,
        site_id: &str,
        page: PageRequest,
    ) -> Result<Paced<AssetsResponse>, Error> {
        self.record(format!("list_assets:{site_id}"));
        let (assets, pagination) = slice(&self.assets, page);
        Ok(Paced::new(AssetsResponse { assets, pagination }))
    }

    async fn get_asset(&self, asset_id: &str) -> Result<Paced<Asset>, Error> {
        self.record(format!("get_asset:{asset_id}"));
        self.assets
            .iter()
            .find(|asset| asset.id == asset_id)
            .cloned()
            .map(Paced::new)
            .ok_or_else(|| not_found(asset_id))
    }
}
