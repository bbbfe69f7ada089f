use chrono::Utc;
use tracing::{debug, error, info};

use super::{UnitOutcome, UnitReport};
use crate::{
    Error, ErrorContext, ErrorDetail, Unit,
    context::SyncContext,
    document::{remove_llms_section, update_llms_section, write_document},
    expand::{clean_content, image_asset_ids},
    exposure::ExposureConfig,
    fetch,
    kv::Store,
    markdown::page::{PageMetadata, render_page},
    progress::{EntryStatus, ProgressReporter},
    warning::collect_warnings,
    webflow::{Api, Page},
};

const PAGES_SECTION: &str = "Pages";
const OPTIONAL_PAGES_SECTION: &str = "Optional Pages";
const PAGES_INTRO: &str = "The following pages are available in the Webflow site:";

async fn sync_page<A: Api, S: Store>(
    ctx: &SyncContext<A>,
    store: &S,
    page: &Page,
    reporter: &dyn ProgressReporter,
    entry: &str,
) -> Result<PageMetadata, Error> {
    let context = ErrorContext::page(&page.id);
    reporter.update_entry(entry, EntryStatus::Fetching);
    let nodes = ctx
        .page_content(&page.id)
        .await
        .map_err(|e| context.error(ErrorDetail::Api(e)))?;
    ctx.prefetch_assets(image_asset_ids(&nodes)).await;

    reporter.update_entry(entry, EntryStatus::Rendering);
    let blocks = clean_content(ctx, &nodes).await;
    let last_updated = page
        .last_updated
        .clone()
        .unwrap_or_else(|| Utc::now().to_rfc3339());
    let metadata = PageMetadata::new(page, last_updated);
    let markdown = render_page(&metadata, &blocks);

    reporter.update_entry(entry, EntryStatus::Writing);
    write_document(store, &metadata.document_key(), &markdown)
        .await
        .map_err(|e| context.store(e))?;
    debug!(page_id = %page.id, slug = %metadata.slug, blocks = blocks.len(), "wrote page");
    Ok(metadata)
}

/// Writes a document for every exposed page, then the `Pages` and
/// `Optional Pages` sections of the index.
pub async fn sync_pages<A: Api, S: Store>(
    ctx: &SyncContext<A>,
    store: &S,
    exposure: &ExposureConfig,
    base_path: &str,
    reporter: &dyn ProgressReporter,
) -> Result<Vec<UnitReport>, Error> {
    let site = ErrorContext::site(ctx.site_id());
    let pages = fetch::fetch_pages(ctx.api(), ctx.gateway(), ctx.site_id())
        .await
        .map_err(|e| site.error(ErrorDetail::Api(e)))
        .inspect_err(|error| error!(%error, "failed to list pages"))?;
    let exposed = pages
        .iter()
        .filter(|page| exposure.is_page_exposed(&page.id))
        .collect::<Vec<_>>();
    info!(total = pages.len(), exposed = exposed.len(), "syncing pages");
    reporter.register_entries(
        exposed
            .iter()
            .map(|page| format!("page:{}", page.document_slug()))
            .collect(),
    );

    let mut entries = Vec::new();
    let mut optional = Vec::new();
    let mut reports = Vec::new();
    for (index, page) in exposed.into_iter().enumerate() {
        if index > 0 {
            tokio::time::sleep(ctx.gateway().unit_delay()).await;
        }
        let entry = format!("page:{}", page.document_slug());
        let (result, warnings) =
            collect_warnings(sync_page(ctx, store, page, reporter, &entry)).await;
        for warning in &warnings {
            reporter.log_warn(&format!("{entry}: {warning}"));
        }
        let outcome = match result {
            Ok(metadata) => {
                let policy = exposure.page_config(&page.id);
                let line = metadata.index_entry(policy, base_path);
                if policy.is_some_and(|policy| policy.is_optional) {
                    optional.push(line);
                } else {
                    entries.push(line);
                }
                reporter.update_entry(&entry, EntryStatus::Done);
                UnitOutcome::Written(metadata.document_key())
            }
            Err(e) => {
                error!(%e, page_id = %page.id, "failed to sync page");
                reporter.update_entry(&entry, EntryStatus::Failed(e.to_string()));
                UnitOutcome::Failed(e.to_string())
            }
        };
        reports.push(UnitReport {
            unit: Unit::Page,
            id: page.id.clone(),
            name: page.title.clone(),
            outcome,
            warnings,
        });
    }

    let section = [PAGES_INTRO.to_owned(), String::new()]
        .into_iter()
        .chain(entries)
        .collect::<Vec<_>>();
    update_llms_section(store, PAGES_SECTION, &section)
        .await
        .map_err(|e| site.store(e))?;
    if optional.is_empty() {
        remove_llms_section(store, OPTIONAL_PAGES_SECTION)
            .await
            .map_err(|e| site.store(e))?;
    } else {
        update_llms_section(store, OPTIONAL_PAGES_SECTION, &optional)
            .await
            .map_err(|e| site.store(e))?;
    }
    Ok(reports)
}
