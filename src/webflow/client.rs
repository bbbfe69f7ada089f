use std::time::Duration;

use reqwest::{StatusCode, header::HeaderMap};
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use super::{
    Api, Asset, AssetsResponse, CollectionItem, CollectionsResponse, ComponentsResponse, Error,
    ItemsResponse, NodesResponse, PageRequest, PagesResponse, Paced, Quota, RawCollection,
    SitesResponse,
};

const API_BASE: &str = "https://api.webflow.com/v2/";

#[derive(derive_debug::Dbg)]
pub struct Client {
    #[dbg(skip)]
    token: String,
    base: url::Url,
    client: reqwest::Client,
}

impl Client {
    pub fn new(token: impl Into<String>) -> Result<Self, Error> {
        Self::with_base(token, API_BASE)
    }

    pub fn with_base(token: impl Into<String>, base: &str) -> Result<Self, Error> {
        Ok(Self {
            token: token.into(),
            base: url::Url::parse(base).map_err(Error::Url)?,
            client: reqwest::Client::new(),
        })
    }

    async fn get<R: DeserializeOwned>(
        &self,
        path: &str,
        page: Option<PageRequest>,
    ) -> Result<Paced<R>, Error> {
        let mut endpoint = self.base.join(path).map_err(Error::Url)?;
        if let Some(PageRequest { offset, limit }) = page {
            endpoint
                .query_pairs_mut()
                .append_pair("offset", &offset.to_string())
                .append_pair("limit", &limit.to_string());
        }
        debug!(%endpoint, "GET");
        let response = self
            .client
            .get(endpoint.clone())
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(Error::Transport)?;
        let status = response.status();
        let quota = quota_from_headers(response.headers());
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited(quota));
        }
        let body = response.text().await.map_err(Error::Transport)?;
        if !status.is_success() {
            error!(%endpoint, %status, "upstream request failed");
            return Err(Error::Status { status, body });
        }
        let body = serde_json::from_str(&body).map_err(Error::Decode)?;
        Ok(Paced { body, quota })
    }
}

fn quota_from_headers(headers: &HeaderMap) -> Option<Quota> {
    let number = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
    };
    let remaining = number("x-ratelimit-remaining").map(|n| n.min(u32::MAX as u64) as u32);
    let reset_after = number("x-ratelimit-reset").map(Duration::from_secs);
    (remaining.is_some() || reset_after.is_some()).then_some(Quota {
        remaining,
        reset_after,
    })
}

impl Api for Client {
    async fn list_sites(&self) -> Result<Paced<SitesResponse>, Error> {
        self.get("sites", None).await
    }

    async fn list_pages(
        &self,
        site_id: &str,
        page: PageRequest,
    ) -> Result<Paced<PagesResponse>, Error> {
        self.get(&format!("sites/{site_id}/pages"), Some(page)).await
    }

    async fn page_content(
        &self,
        page_id: &str,
        page: PageRequest,
    ) -> Result<Paced<NodesResponse>, Error> {
        self.get(&format!("pages/{page_id}/dom"), Some(page)).await
    }

    async fn list_collections(&self, site_id: &str) -> Result<Paced<CollectionsResponse>, Error> {
        self.get(&format!("sites/{site_id}/collections"), None).await
    }

    async fn collection(&self, collection_id: &str) -> Result<Paced<RawCollection>, Error> {
        self.get(&format!("collections/{collection_id}"), None).await
    }

    async fn list_items(
        &self,
        collection_id: &str,
        page: PageRequest,
    ) -> Result<Paced<ItemsResponse>, Error> {
        self.get(&format!("collections/{collection_id}/items/live"), Some(page))
            .await
    }

    async fn get_item(
        &self,
        collection_id: &str,
        item_id: &str,
    ) -> Result<Paced<CollectionItem>, Error> {
        self.get(
            &format!("collections/{collection_id}/items/{item_id}/live"),
            None,
        )
        .await
    }

    async fn list_components(
        &self,
        site_id: &str,
        page: PageRequest,
    ) -> Result<Paced<ComponentsResponse>, Error> {
        self.get(&format!("sites/{site_id}/components"), Some(page))
            .await
    }

    async fn component_content(
        &self,
        site_id: &str,
        component_id: &str,
        page: PageRequest,
    ) -> Result<Paced<NodesResponse>, Error> {
        self.get(
            &format!("sites/{site_id}/components/{component_id}/dom"),
            Some(page),
        )
        .await
    }

    async fn list_assets(
        &self,
        site_id: &str,
        page: PageRequest,
    ) -> Result<Paced<AssetsResponse>, Error> {
        self.get(&format!("sites/{site_id}/assets"), Some(page)).await
    }

    async fn get_asset(&self, asset_id: &str) -> Result<Paced<Asset>, Error> {
        self.get(&format!("assets/{asset_id}"), None).await
    }
}
