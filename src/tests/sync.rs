use maplit::hashmap;
use serde_json::json;

use super::fake::{FakeApi, de};
use crate::{
    ErrorDetail,
    document::INDEX_KEY,
    exposure::{PagePolicy, SETTINGS_KEY, save_page_settings},
    kv::{Store, memory::MemoryStore},
    progress::NullReporter,
    sync::{SyncOptions, SyncTarget, UnitOutcome, UnitReport, sync_all},
    warning::{UnitWarning, WarningSource},
    webflow::{CollectionSummary, Page},
};

fn api() -> FakeApi {
    let mut api = FakeApi::site("Acme Docs");
    api.pages = de(json!([
        {"id": "p_about", "title": "About us", "slug": "about",
         "lastUpdated": "2024-05-01T00:00:00.000Z",
         "seo": {"description": "Who we are"}},
        {"id": "p_secret", "title": "Secret", "slug": "secret"},
        {"id": "p_draft", "title": "Draft", "slug": "draft", "draft": true},
    ]));
    api.page_nodes = hashmap! {
        "p_about".to_owned() => de(json!([
            {"type": "text", "id": "t1", "text": {"html": "<h2>Our story</h2>"}},
            {"type": "text", "id": "t2", "text": {"html": "<p>Founded in a garage.</p>"}},
        ])),
        "p_secret".to_owned() => de(json!([
            {"type": "text", "id": "t1", "text": {"html": "<p>Hidden</p>"}},
        ])),
        "p_draft".to_owned() => de(json!([])),
    };
    api.collections = de(json!([
        {"id": "c_post", "displayName": "Posts"},
        {"id": "c_hidden", "displayName": "Hidden"},
    ]));
    api.schemas = hashmap! {
        "c_post".to_owned() => de(json!({
            "id": "c_post",
            "displayName": "Posts",
            "singularName": "Post",
            "lastUpdated": "2024-05-02T00:00:00.000Z",
            "fields": [
                {"id": "f-name", "slug": "name", "displayName": "Name", "type": "PlainText"},
                {"id": "f-body", "slug": "body", "displayName": "Body", "type": "RichText"},
            ]
        })),
    };
    api.items = hashmap! {
        "c_post".to_owned() => de(json!([
            {"id": "post1", "fieldData": {"name": "Hello", "body": "<p>Private notes</p>"}},
            {"id": "post2", "isDraft": true, "fieldData": {"name": "Unfinished"}},
        ])),
    };
    api
}

async fn settings(pages: serde_json::Value) -> MemoryStore {
    let store = MemoryStore::new();
    let settings = json!({
        "collections": {
            "c_post": {"isVisible": true, "fields": {"f-name": {"include": true}}},
            "c_hidden": {"isVisible": false},
        },
        "pages": pages,
    });
    store.put(SETTINGS_KEY, &settings.to_string()).await.unwrap();
    store
}

fn bullets(document: &str, title: &str) -> Vec<String> {
    let heading = format!("## {title}");
    document
        .lines()
        .skip_while(|line| *line != heading)
        .skip(1)
        .take_while(|line| !line.starts_with("## "))
        .filter(|line| line.starts_with("- "))
        .map(str::to_owned)
        .collect()
}

#[tokio::test]
async fn test_sync_exposed_pages_and_collections() {
    let ctx = api().into_context();
    let store = MemoryStore::new();
    let settings = settings(json!({
        "p_about": {"isVisible": true},
        "p_secret": {"isVisible": false},
    }))
    .await;

    let report = sync_all(&ctx, &store, &settings, &SyncOptions::default(), &NullReporter)
        .await
        .unwrap();
    assert!(report.is_success());
    assert_eq!(report.pages.len(), 1);
    assert_eq!(
        report.collections[0].outcome,
        UnitOutcome::Written("collections/posts".into())
    );

    let about = store.get("docs/about.md").await.unwrap().unwrap();
    assert!(about.starts_with("---\ntitle: About us\nslug: about\ndescription: Who we are\n"));
    assert!(about.contains("## Our story"));
    assert!(store.get("docs/about").await.unwrap().is_some());
    assert!(store.get("docs/secret").await.unwrap().is_none());
    assert!(store.get("docs/secret.md").await.unwrap().is_none());

    let posts = store.get("collections/posts.md").await.unwrap().unwrap();
    assert!(posts.contains("## Hello"));
    assert!(!posts.contains("Unfinished"));
    assert!(!posts.contains("Private notes"));
    assert!(store.get("collections/hidden.md").await.unwrap().is_none());

    let index = store.get(INDEX_KEY).await.unwrap().unwrap();
    assert!(index.starts_with("# Acme Docs\n"));
    assert_eq!(
        bullets(&index, "Pages"),
        vec!["- [About us](/docs/about.md): Who we are".to_owned()]
    );
    assert_eq!(
        bullets(&index, "Collections"),
        vec!["- [Posts](/collections/posts.md): Collection with 2 items".to_owned()]
    );
    assert!(!index.contains("## Optional Pages"));
}

#[tokio::test]
async fn test_repeated_runs_keep_one_copy_of_each_section() {
    let ctx = api().into_context();
    let store = MemoryStore::new();
    let settings = settings(json!({
        "p_about": {"isVisible": true},
        "p_secret": {"isVisible": true, "isOptional": true, "displayName": "Extras"},
    }))
    .await;
    let options = SyncOptions {
        target: SyncTarget::All,
        base_path: "/llms".into(),
    };

    sync_all(&ctx, &store, &settings, &options, &NullReporter)
        .await
        .unwrap();
    let first = store.get(INDEX_KEY).await.unwrap().unwrap();
    assert_eq!(
        bullets(&first, "Optional Pages"),
        vec!["- [Extras](/llms/docs/secret.md)".to_owned()]
    );

    sync_all(&ctx, &store, &settings, &options, &NullReporter)
        .await
        .unwrap();
    assert_eq!(store.get(INDEX_KEY).await.unwrap().unwrap(), first);

    save_page_settings(
        &settings,
        [(
            "p_about".to_owned(),
            PagePolicy {
                is_visible: true,
                ..Default::default()
            },
        )]
        .into_iter()
        .collect(),
    )
    .await
    .unwrap();
    let pages_only = SyncOptions {
        target: SyncTarget::Pages,
        ..options
    };
    sync_all(&ctx, &store, &settings, &pages_only, &NullReporter)
        .await
        .unwrap();
    let index = store.get(INDEX_KEY).await.unwrap().unwrap();
    assert!(!index.contains("## Optional Pages"));
    assert_eq!(index.matches("## Pages").count(), 1);
    assert_eq!(bullets(&index, "Collections").len(), 1);
}

#[tokio::test]
async fn test_unknown_site_aborts() {
    let ctx = FakeApi::default().into_context();
    let store = MemoryStore::new();
    let settings = MemoryStore::new();

    let error = sync_all(&ctx, &store, &settings, &SyncOptions::default(), &NullReporter)
        .await
        .unwrap_err();
    assert!(matches!(*error.detail, ErrorDetail::SiteNotFound));
    assert!(store.is_empty().await);
}

fn unit_report<'a>(units: &'a [UnitReport], id: &str) -> &'a UnitReport {
    units.iter().find(|unit| unit.id == id).unwrap()
}

#[tokio::test]
async fn test_failing_units_do_not_stop_the_run() {
    let mut api = api();
    api.pages.extend(de::<Vec<Page>>(json!([
        {"id": "p_broken", "title": "Broken", "slug": "broken"},
        {"id": "p_team", "title": "Team", "slug": "team"},
    ])));
    api.page_nodes.insert(
        "p_team".to_owned(),
        de(json!([
            {"type": "text", "id": "t1", "text": {"html": "<p>Our team</p>"}},
            {"type": "image", "id": "img1", "image": {"assetId": "a_gone", "alt": "Team"}},
        ])),
    );
    api.collections
        .extend(de::<Vec<CollectionSummary>>(json!([{"id": "c_gone", "displayName": "Gone"}])));
    let ctx = api.into_context();
    let store = MemoryStore::new();
    let settings = MemoryStore::new();
    let policy = json!({
        "collections": {
            "c_post": {"isVisible": true, "fields": {"f-name": {"include": true}}},
            "c_gone": {"isVisible": true, "fields": {"f-name": {"include": true}}},
        },
        "pages": {
            "p_about": {"isVisible": true},
            "p_broken": {"isVisible": true},
            "p_team": {"isVisible": true},
        },
    });
    settings
        .put(SETTINGS_KEY, &policy.to_string())
        .await
        .unwrap();

    let report = sync_all(&ctx, &store, &settings, &SyncOptions::default(), &NullReporter)
        .await
        .unwrap();
    assert!(!report.is_success());
    assert_eq!(report.failed(), 2);
    assert!(matches!(
        &unit_report(&report.pages, "p_broken").outcome,
        UnitOutcome::Failed(message) if message.contains("p_broken not found")
    ));
    assert!(matches!(
        &unit_report(&report.collections, "c_gone").outcome,
        UnitOutcome::Failed(message) if message.contains("c_gone not found")
    ));
    assert_eq!(
        unit_report(&report.pages, "p_about").outcome,
        UnitOutcome::Written("docs/about".into())
    );

    // The image asset is missing upstream: the page is written without it.
    let team = unit_report(&report.pages, "p_team");
    assert_eq!(team.outcome, UnitOutcome::Written("docs/team".into()));
    assert!(team.warnings.contains(&UnitWarning::new(
        WarningSource::Asset,
        "image asset a_gone not found"
    )));
    assert!(
        team.warnings
            .iter()
            .all(|warning| warning.source == WarningSource::Asset)
    );
    let team_doc = store.get("docs/team.md").await.unwrap().unwrap();
    assert!(team_doc.contains("Our team"));
    assert!(!team_doc.contains("!["));

    assert!(store.get("docs/broken.md").await.unwrap().is_none());
    assert!(store.get("collections/posts.md").await.unwrap().is_some());
    let index = store.get(INDEX_KEY).await.unwrap().unwrap();
    assert_eq!(
        bullets(&index, "Pages"),
        vec![
            "- [About us](/docs/about.md): Who we are".to_owned(),
            "- [Team](/docs/team.md)".to_owned(),
        ]
    );
    assert_eq!(bullets(&index, "Collections").len(), 1);
}
