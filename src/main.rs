use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use tracing::{error, info};
use webflow_llms::{
    ErrorContext, ErrorDetail,
    config::{Config, StoreConfig},
    context::SyncContext,
    document, exposure,
    kv::{self, Store, cloudflare::KvStore, memory::MemoryStore, sqlite::LocalStorage},
    progress::{SyncPhase, create_reporter},
    sync::{SyncOptions, SyncTarget, sync_all},
    webflow::client::Client,
};

#[derive(Parser)]
struct Opts {
    #[clap(short, long, env = "WEBFLOW_LLMS_CONFIG")]
    config: Option<PathBuf>,
    #[clap(long, env = "WEBFLOW_SITE_ID", hide_env_values = true)]
    site_id: Option<String>,
    #[clap(long, env = "WEBFLOW_SITE_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,
    #[clap(long, env = "CLOUDFLARE_API_TOKEN", hide_env_values = true)]
    cloudflare_token: Option<String>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Regenerate documents and the llms.txt index.
    Sync {
        #[clap(long, value_enum, default_value_t = SyncTarget::All)]
        target: SyncTarget,
    },
    /// Print a generated document, e.g. `llms.txt` or `docs/about.md`.
    Show { path: String },
    /// Delete every generated document and the exposure settings.
    Clear {
        /// Leave the exposure settings in place.
        #[clap(long)]
        keep_settings: bool,
    },
    /// Replace the collection half of the exposure settings from a JSON file.
    SetCollections { file: PathBuf },
    /// Replace the page half of the exposure settings from a JSON file.
    SetPages { file: PathBuf },
}

async fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read config from {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&raw)
        .with_context(|| format!("parse config from {}", path.display()))?;
    config.validate().map_err(|msg| anyhow!("{msg}"))?;
    Ok(config)
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
}

async fn run_command<S: Store, P: Store>(
    opts: &Opts,
    config: &Config,
    store: &S,
    settings: &P,
) -> anyhow::Result<()> {
    let site_id = opts.site_id.as_deref().unwrap_or_default();
    let site = ErrorContext::site(site_id);
    match &opts.command {
        Command::Sync { target } => {
            if site_id.is_empty() {
                return Err(site.error(ErrorDetail::MissingConfig("WEBFLOW_SITE_ID")).into());
            }
            let token = opts
                .api_token
                .as_deref()
                .ok_or_else(|| site.error(ErrorDetail::MissingConfig("WEBFLOW_SITE_API_TOKEN")))?;
            let client = Client::new(token).map_err(|e| site.error(ErrorDetail::Api(e)))?;
            let ctx = SyncContext::new(client, site_id, config.pacing.clone(), config.cache_ttl());
            let options = SyncOptions {
                target: *target,
                base_path: config.base_path.clone(),
            };
            let reporter = create_reporter();
            let result = sync_all(&ctx, store, settings, &options, reporter.as_ref()).await;
            if let Err(e) = &result {
                reporter.set_phase(SyncPhase::Failed(e.to_string()));
            }
            reporter.finish();
            let report = result?;
            println!("{}", report.to_json());
        }
        Command::Show { path } => {
            let served = document::serve(store, path).await;
            if served.status >= 500 {
                return Err(anyhow!("{}", served.body));
            }
            print!("{}", served.body);
        }
        Command::Clear { keep_settings } => {
            let cleared = kv::clear_stores(&site, store, settings, *keep_settings)
                .await
                .context("clear stores")?;
            info!(
                documents = cleared.documents,
                settings = cleared.settings,
                "cleared stores"
            );
        }
        Command::SetCollections { file } => {
            let collections: IndexMap<String, exposure::CollectionPolicy> = read_json(file).await?;
            exposure::save_collection_settings(settings, collections)
                .await
                .map_err(|e| site.error(e.into()))?;
        }
        Command::SetPages { file } => {
            let pages: IndexMap<String, exposure::PagePolicy> = read_json(file).await?;
            exposure::save_page_settings(settings, pages)
                .await
                .map_err(|e| site.error(e.into()))?;
        }
    }
    Ok(())
}

async fn run(opts: Opts) -> anyhow::Result<()> {
    let config = load_config(opts.config.as_deref()).await?;
    match &config.store {
        StoreConfig::Memory => {
            run_command(&opts, &config, &MemoryStore::new(), &MemoryStore::new()).await
        }
        StoreConfig::Sqlite { url } => {
            let storage = LocalStorage::open(url)
                .await
                .with_context(|| format!("open {url}"))?;
            run_command(
                &opts,
                &config,
                &storage.kv("content"),
                &storage.kv("settings"),
            )
            .await
        }
        StoreConfig::CloudflareKv {
            account_id,
            content_namespace,
            settings_namespace,
        } => {
            let token = opts
                .cloudflare_token
                .clone()
                .ok_or_else(|| anyhow!("CLOUDFLARE_API_TOKEN is required for Cloudflare KV"))?;
            let content = KvStore::new(account_id, content_namespace, &token);
            let settings = KvStore::new(account_id, settings_namespace, &token);
            run_command(&opts, &config, &content, &settings).await
        }
    }
}

#[tokio::main]
async fn main() {
    let opts = Opts::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    if let Err(e) = run(opts).await {
        error!(?e, "critical error");
        std::process::exit(1);
    }
}
