//! Upstream content API.
//!
//! [`Api`] is the seam between the sync pipeline and Webflow: one method per
//! upstream operation, each returning the decoded body together with the
//! rate-limit quota reported by the response.

use std::time::Duration;

pub mod client;
pub mod types;

pub use types::*;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// 429, with the quota headers the response carried.
    #[error("rate limited by upstream")]
    RateLimited(Option<Quota>),
    #[error("upstream returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to decode upstream payload: {0}")]
    Decode(serde_json::Error),
    #[error("invalid endpoint: {0}")]
    Url(url::ParseError),
}

impl Error {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::RateLimited(_))
    }

    pub fn quota(&self) -> Option<Quota> {
        match self {
            Error::RateLimited(quota) => *quota,
            _ => None,
        }
    }
}

/// Rate-limit state reported by a response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Quota {
    pub remaining: Option<u32>,
    /// Time until the quota window resets.
    pub reset_after: Option<Duration>,
}

/// A decoded response body plus the quota it carried.
#[derive(Debug, Clone)]
pub struct Paced<T> {
    pub body: T,
    pub quota: Option<Quota>,
}

impl<T> Paced<T> {
    pub fn new(body: T) -> Self {
        Self { body, quota: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

/// A listing response that carries one page of results.
pub trait Paginated {
    type Item;
    fn into_parts(self) -> (Vec<Self::Item>, Option<Pagination>);
}

impl Paginated for PagesResponse {
    type Item = Page;
    fn into_parts(self) -> (Vec<Page>, Option<Pagination>) {
        (self.pages, self.pagination)
    }
}

impl Paginated for NodesResponse {
    type Item = Node;
    fn into_parts(self) -> (Vec<Node>, Option<Pagination>) {
        (self.nodes, self.pagination)
    }
}

impl Paginated for ComponentsResponse {
    type Item = Component;
    fn into_parts(self) -> (Vec<Component>, Option<Pagination>) {
        (self.components, self.pagination)
    }
}

impl Paginated for ItemsResponse {
    type Item = CollectionItem;
    fn into_parts(self) -> (Vec<CollectionItem>, Option<Pagination>) {
        (self.items, self.pagination)
    }
}

impl Paginated for AssetsResponse {
    type Item = Asset;
    fn into_parts(self) -> (Vec<Asset>, Option<Pagination>) {
        (self.assets, self.pagination)
    }
}

pub trait Api: Send + Sync {
    fn list_sites(&self) -> impl Future<Output = Result<Paced<SitesResponse>, Error>> + Send;

    fn list_pages(
        &self,
        site_id: &str,
        page: PageRequest,
    ) -> impl Future<Output = Result<Paced<PagesResponse>, Error>> + Send;

    fn page_content(
        &self,
        page_id: &str,
        page: PageRequest,
    ) -> impl Future<Output = Result<Paced<NodesResponse>, Error>> + Send;

    fn list_collections(
        &self,
        site_id: &str,
    ) -> impl Future<Output = Result<Paced<CollectionsResponse>, Error>> + Send;

    fn collection(
        &self,
        collection_id: &str,
    ) -> impl Future<Output = Result<Paced<RawCollection>, Error>> + Send;

    fn list_items(
        &self,
        collection_id: &str,
        page: PageRequest,
    ) -> impl Future<Output = Result<Paced<ItemsResponse>, Error>> + Send;

    fn get_item(
        &self,
        collection_id: &str,
        item_id: &str,
    ) -> impl Future<Output = Result<Paced<CollectionItem>, Error>> + Send;

    fn list_components(
        &self,
        site_id: &str,
        page: PageRequest,
    ) -> impl Future<Output = Result<Paced<ComponentsResponse>, Error>> + Send;

    fn component_content(
        &self,
        site_id: &str,
        component_id: &str,
        page: PageRequest,
    ) -> impl Future<Output = Result<Paced<NodesResponse>, Error>> + Send;

    fn list_assets(
        &self,
        site_id: &str,
        page: PageRequest,
    ) -> impl Future<Output = Result<Paced<AssetsResponse>, Error>> + Send;

    fn get_asset(&self, asset_id: &str) -> impl Future<Output = Result<Paced<Asset>, Error>> + Send;
}
