use tracing::{debug, trace};

use crate::{
    gateway::Gateway,
    webflow::{
        Api, Asset, CollectionItem, CollectionSummary, Component, Error, Node, Page, PageRequest,
        Paced, Paginated,
    },
};

pub const PAGE_SIZE: usize = 100;

/// Pages through a listing until an empty page or the reported total.
///
/// Every page goes through the gateway; a fixed delay separates consecutive pages.
pub async fn fetch_all<R, F, Fut>(
    gateway: &Gateway,
    page_size: usize,
    mut fetch_page: F,
) -> Result<Vec<R::Item>, Error>
where
    R: Paginated,
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Paced<R>, Error>>,
{
    let mut collected = Vec::new();
    let mut offset = 0;
    loop {
        if offset > 0 {
            tokio::time::sleep(gateway.page_delay()).await;
        }
        let request = PageRequest {
            offset,
            limit: page_size,
        };
        let (items, pagination) = gateway.call(|| fetch_page(request)).await?.into_parts();
        trace!(offset, count = items.len(), "fetched page");
        if items.is_empty() {
            break;
        }
        collected.extend(items);
        let Some(pagination) = pagination else {
            break;
        };
        offset += if pagination.limit > 0 {
            pagination.limit
        } else {
            page_size
        };
        if offset >= pagination.total {
            break;
        }
    }
    Ok(collected)
}

/// Published pages of a site; drafts, archived pages and templates are dropped.
pub async fn fetch_pages<A: Api>(
    api: &A,
    gateway: &Gateway,
    site_id: &str,
) -> Result<Vec<Page>, Error> {
    let pages = fetch_all(gateway, PAGE_SIZE, |page| api.list_pages(site_id, page)).await?;
    let total = pages.len();
    let pages = pages
        .into_iter()
        .filter(Page::is_published)
        .collect::<Vec<_>>();
    debug!(total, published = pages.len(), "fetched pages");
    Ok(pages)
}

pub async fn fetch_page_content<A: Api>(
    api: &A,
    gateway: &Gateway,
    page_id: &str,
) -> Result<Vec<Node>, Error> {
    fetch_all(gateway, PAGE_SIZE, |page| api.page_content(page_id, page)).await
}

pub async fn fetch_components<A: Api>(
    api: &A,
    gateway: &Gateway,
    site_id: &str,
) -> Result<Vec<Component>, Error> {
    fetch_all(gateway, PAGE_SIZE, |page| api.list_components(site_id, page)).await
}

pub async fn fetch_component_content<A: Api>(
    api: &A,
    gateway: &Gateway,
    site_id: &str,
    component_id: &str,
) -> Result<Vec<Node>, Error> {
    fetch_all(gateway, PAGE_SIZE, |page| {
        api.component_content(site_id, component_id, page)
    })
    .await
}

/// Every collection of a site in one request. The collections listing of the v2
/// API carries no pagination, unlike pages and items.
pub async fn fetch_collections<A: Api>(
    api: &A,
    gateway: &Gateway,
    site_id: &str,
) -> Result<Vec<CollectionSummary>, Error> {
    let response = gateway.call(|| api.list_collections(site_id)).await?;
    Ok(response.collections)
}

pub async fn fetch_items<A: Api>(
    api: &A,
    gateway: &Gateway,
    collection_id: &str,
) -> Result<Vec<CollectionItem>, Error> {
    fetch_all(gateway, PAGE_SIZE, |page| {
        api.list_items(collection_id, page)
    })
    .await
}

/// Item count from the `total` of a one-item listing.
pub async fn fetch_item_count<A: Api>(
    api: &A,
    gateway: &Gateway,
    collection_id: &str,
) -> Result<usize, Error> {
    let request = PageRequest {
        offset: 0,
        limit: 1,
    };
    let response = gateway
        .call(|| api.list_items(collection_id, request))
        .await?;
    Ok(response
        .pagination
        .map(|pagination| pagination.total)
        .unwrap_or(response.items.len()))
}

pub async fn fetch_assets<A: Api>(
    api: &A,
    gateway: &Gateway,
    site_id: &str,
) -> Result<Vec<Asset>, Error> {
    fetch_all(gateway, PAGE_SIZE, |page| api.list_assets(site_id, page)).await
}
