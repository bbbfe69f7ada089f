use chrono::Utc;
use tracing::{debug, error, info};

use super::{UnitOutcome, UnitReport};
use crate::{
    Error, ErrorContext, ErrorDetail, Unit,
    context::SyncContext,
    document::{update_llms_section, write_document},
    exposure::ExposureConfig,
    fetch,
    kv::Store,
    markdown::collection::{CollectionMetadata, ExposedItem, collection_slug, render_collection},
    progress::{EntryStatus, ProgressReporter},
    reference::resolve_reference_fields,
    warning::collect_warnings,
    webflow::{Api, CollectionSummary},
};

const COLLECTIONS_SECTION: &str = "Collections";
const COLLECTIONS_INTRO: &str = "The following collections are available in the Webflow site:";

enum Synced {
    Written { key: String, index_entry: String },
    NoExposedFields,
}

async fn sync_collection<A: Api, S: Store>(
    ctx: &SyncContext<A>,
    store: &S,
    exposure: &ExposureConfig,
    summary: &CollectionSummary,
    base_path: &str,
    reporter: &dyn ProgressReporter,
    entry: &str,
) -> Result<Synced, Error> {
    let context = ErrorContext::collection(&summary.id);
    let api_error = |e| context.error(ErrorDetail::Api(e));

    reporter.update_entry(entry, EntryStatus::Fetching);
    let schema = ctx.schema(&summary.id).await.map_err(api_error)?;
    let fields = exposure.filter_exposed_fields(&summary.id, &schema.field_map());
    if fields.is_empty() {
        debug!(collection_id = %summary.id, "collection has no exposed fields");
        return Ok(Synced::NoExposedFields);
    }
    let items = fetch::fetch_items(ctx.api(), ctx.gateway(), &summary.id)
        .await
        .map_err(api_error)?;
    let item_count = fetch::fetch_item_count(ctx.api(), ctx.gateway(), &summary.id)
        .await
        .map_err(api_error)?;

    let live = items
        .into_iter()
        .filter(|item| !item.is_draft && !item.is_archived)
        .collect::<Vec<_>>();
    let total = live.len();
    let mut exposed = Vec::with_capacity(total);
    for (index, item) in live.into_iter().enumerate() {
        reporter.update_entry(
            entry,
            EntryStatus::Resolving {
                current: index + 1,
                total,
            },
        );
        let item = resolve_reference_fields(ctx, item, &schema).await;
        exposed.push(ExposedItem {
            data: exposure.filter_exposed_item_data(&summary.id, &item.field_data, &schema),
            id: item.id,
        });
    }

    reporter.update_entry(entry, EntryStatus::Rendering);
    let policy = exposure.collection_config(&summary.id);
    let title = policy
        .and_then(|policy| policy.display_name.as_deref())
        .filter(|name| !name.is_empty())
        .unwrap_or(&schema.name)
        .to_owned();
    let metadata = CollectionMetadata {
        title,
        slug: collection_slug(&schema.name),
        name: schema.name.clone(),
        singular_name: schema.singular_name.clone(),
        description: policy.and_then(|policy| policy.description.clone()),
        last_updated: schema
            .last_updated
            .clone()
            .unwrap_or_else(|| Utc::now().to_rfc3339()),
    };
    let markdown = render_collection(&metadata, &exposed, &fields);

    reporter.update_entry(entry, EntryStatus::Writing);
    let key = metadata.document_key();
    write_document(store, &key, &markdown)
        .await
        .map_err(|e| context.store(e))?;
    debug!(collection_id = %summary.id, slug = %metadata.slug, items = total, "wrote collection");
    Ok(Synced::Written {
        index_entry: metadata.index_entry(item_count, base_path),
        key,
    })
}

/// Writes a document for every exposed collection, then the `Collections`
/// section of the index.
pub async fn sync_collections<A: Api, S: Store>(
    ctx: &SyncContext<A>,
    store: &S,
    exposure: &ExposureConfig,
    base_path: &str,
    reporter: &dyn ProgressReporter,
) -> Result<Vec<UnitReport>, Error> {
    let site = ErrorContext::site(ctx.site_id());
    let collections = fetch::fetch_collections(ctx.api(), ctx.gateway(), ctx.site_id())
        .await
        .map_err(|e| site.error(ErrorDetail::Api(e)))
        .inspect_err(|error| error!(%error, "failed to list collections"))?;
    let exposed = collections
        .iter()
        .filter(|collection| exposure.is_collection_exposed(&collection.id))
        .collect::<Vec<_>>();
    info!(
        total = collections.len(),
        exposed = exposed.len(),
        "syncing collections"
    );
    let name_of = |summary: &CollectionSummary| {
        summary
            .display_name
            .clone()
            .unwrap_or_else(|| summary.id.clone())
    };
    reporter.register_entries(
        exposed
            .iter()
            .map(|summary| format!("collection:{}", name_of(summary)))
            .collect(),
    );

    let mut entries = Vec::new();
    let mut reports = Vec::new();
    for (index, summary) in exposed.into_iter().enumerate() {
        if index > 0 {
            tokio::time::sleep(ctx.gateway().unit_delay()).await;
        }
        let entry = format!("collection:{}", name_of(summary));
        let (result, warnings) = collect_warnings(sync_collection(
            ctx, store, exposure, summary, base_path, reporter, &entry,
        ))
        .await;
        for warning in &warnings {
            reporter.log_warn(&format!("{entry}: {warning}"));
        }
        let outcome = match result {
            Ok(Synced::Written { key, index_entry }) => {
                entries.push(index_entry);
                reporter.update_entry(&entry, EntryStatus::Done);
                UnitOutcome::Written(key)
            }
            Ok(Synced::NoExposedFields) => {
                let reason = "no exposed fields".to_owned();
                reporter.update_entry(&entry, EntryStatus::Skipped(reason.clone()));
                UnitOutcome::Skipped(reason)
            }
            Err(e) => {
                error!(%e, collection_id = %summary.id, "failed to sync collection");
                reporter.update_entry(&entry, EntryStatus::Failed(e.to_string()));
                UnitOutcome::Failed(e.to_string())
            }
        };
        reports.push(UnitReport {
            unit: Unit::Collection,
            id: summary.id.clone(),
            name: name_of(summary),
            outcome,
            warnings,
        });
    }

    let section = [COLLECTIONS_INTRO.to_owned(), String::new()]
        .into_iter()
        .chain(entries)
        .collect::<Vec<_>>();
    update_llms_section(store, COLLECTIONS_SECTION, &section)
        .await
        .map_err(|e| site.store(e))?;
    Ok(reports)
}
