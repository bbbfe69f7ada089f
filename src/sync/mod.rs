//! Sync runs: mirror the exposed pages and collections of a site into the
//! document store and merge their sections into `llms.txt`.
//!
//! Units are processed one at a time with a fixed delay between them. A unit
//! that fails is logged and reported; the run goes on with the next one.

mod collections;
mod pages;

pub use collections::sync_collections;
pub use pages::sync_pages;

use serde_json::json;
use tracing::{info, warn};

use crate::{
    Error, ErrorContext, ErrorDetail, Unit,
    context::SyncContext,
    document,
    exposure::load_exposure_settings,
    kv::Store,
    progress::{ProgressReporter, SyncPhase},
    warning::UnitWarning,
    webflow::Api,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SyncTarget {
    #[default]
    All,
    Pages,
    Collections,
}

impl SyncTarget {
    fn pages(self) -> bool {
        matches!(self, SyncTarget::All | SyncTarget::Pages)
    }

    fn collections(self) -> bool {
        matches!(self, SyncTarget::All | SyncTarget::Collections)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    /// Document written under this key.
    Written(String),
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitReport {
    pub unit: Unit,
    pub id: String,
    pub name: String,
    pub outcome: UnitOutcome,
    /// Non-fatal problems collected while the unit was processed.
    pub warnings: Vec<UnitWarning>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub pages: Vec<UnitReport>,
    pub collections: Vec<UnitReport>,
}

impl SyncReport {
    pub fn units(&self) -> impl Iterator<Item = &UnitReport> {
        self.pages.iter().chain(&self.collections)
    }

    pub fn failed(&self) -> usize {
        self.units()
            .filter(|unit| matches!(unit.outcome, UnitOutcome::Failed(_)))
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn message(&self) -> String {
        let written = |units: &[UnitReport]| {
            units
                .iter()
                .filter(|unit| matches!(unit.outcome, UnitOutcome::Written(_)))
                .count()
        };
        let mut message = format!(
            "Synced {} pages and {} collections",
            written(&self.pages),
            written(&self.collections)
        );
        if self.failed() > 0 {
            message.push_str(&format!(" ({} failed)", self.failed()));
        }
        message
    }

    /// `{success, message}` response body.
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "success": self.is_success(),
            "message": self.message(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub target: SyncTarget,
    pub base_path: String,
}

/// Full run: load the policy, make sure the index exists, then sync the
/// requested units.
pub async fn sync_all<A: Api, S: Store, P: Store>(
    ctx: &SyncContext<A>,
    store: &S,
    settings: &P,
    options: &SyncOptions,
    reporter: &dyn ProgressReporter,
) -> Result<SyncReport, Error> {
    let site = ErrorContext::site(ctx.site_id());
    if ctx.site_id().is_empty() {
        return Err(site.error(ErrorDetail::MissingConfig("site id")));
    }

    reporter.set_phase(SyncPhase::LoadingSettings);
    let exposure = load_exposure_settings(settings)
        .await
        .map_err(|e| site.store(e))?;

    let sites = ctx
        .gateway()
        .call(|| ctx.api().list_sites())
        .await
        .map_err(|e| site.error(ErrorDetail::Api(e)))?;
    let found = sites
        .sites
        .into_iter()
        .find(|candidate| candidate.id == ctx.site_id())
        .ok_or_else(|| site.error(ErrorDetail::SiteNotFound))?;
    if document::ensure_index(store, found.display_name.as_deref())
        .await
        .map_err(|e| site.store(e))?
    {
        info!(site_id = ctx.site_id(), "created llms.txt");
    }

    reporter.set_phase(SyncPhase::LoadingAssets);
    if let Err(error) = ctx.load_assets().await {
        warn!(%error, "failed to list assets, images are fetched one by one");
        reporter.log_warn(&format!("failed to list assets: {error}"));
    }

    let mut report = SyncReport::default();
    if options.target.pages() {
        reporter.set_phase(SyncPhase::SyncingPages);
        report.pages = sync_pages(ctx, store, &exposure, &options.base_path, reporter).await?;
    }
    if options.target.collections() {
        reporter.set_phase(SyncPhase::SyncingCollections);
        report.collections =
            sync_collections(ctx, store, &exposure, &options.base_path, reporter).await?;
    }

    info!(
        pages = report.pages.len(),
        collections = report.collections.len(),
        failed = report.failed(),
        "sync finished"
    );
    reporter.set_phase(SyncPhase::Completed);
    Ok(report)
}
