//! HTTP JSON source tests
//!
//! These tests use wiremock to serve index pages and reports.

use report_harvest::config::{HarvestConfig, SourceConfig, UserAgentConfig};
use report_harvest::harvest::{
    build_http_client, harvest, run_pipeline, HttpJsonSource, ItemRef, ListingSource, PageRef,
    PipelineOptions, SilentReporter, SourceError,
};
use report_harvest::output::{JsonLinesWriter, StorageSink, TeeSink};
use report_harvest::storage::{NoDedup, SqliteStorage, Storage};
use report_harvest::HarvestError;
use serde_json::json;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

fn source_for(server: &MockServer) -> HttpJsonSource {
    let config = SourceConfig {
        index_url: format!("{}/reports?page={{page}}", server.uri()),
        items_field: "items".to_string(),
        total_pages_field: "total_pages".to_string(),
    };
    let client = build_http_client(&user_agent()).expect("Failed to build client");
    HttpJsonSource::new(client, &config).expect("Failed to build source")
}

fn no_pause() -> HarvestConfig {
    HarvestConfig {
        group_size: 2,
        group_interval_ms: 0,
        ..HarvestConfig::default()
    }
}

async fn mount_index(server: &MockServer, page: u32, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/reports"))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_report(server: &MockServer, report_path: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(report_path))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_reads_index_and_resolves_references() {
    let server = MockServer::start().await;
    mount_index(
        &server,
        1,
        json!({ "items": ["/r/1", "r/2"], "total_pages": 4 }),
    )
    .await;

    let source = source_for(&server);
    let page = source.fetch_index(&source.page_of(1)).await.unwrap();

    assert_eq!(
        page.item_refs,
        vec![
            ItemRef::from(format!("{}/r/1", server.uri())),
            ItemRef::from(format!("{}/r/2", server.uri())),
        ]
    );
    assert_eq!(page.total_pages, Some(4));
}

#[tokio::test]
async fn test_sends_identifying_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/r/1"))
        .and(header(
            "user-agent",
            "TestBot/1.0.0 (+https://example.com/contact; test@example.com)",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1 })))
        .expect(1)
        .mount(&server)
        .await;

    let source = source_for(&server);
    let report = source
        .fetch_item(&ItemRef::from(format!("{}/r/1", server.uri())))
        .await
        .unwrap();

    assert_eq!(report, json!({ "id": 1 }));
}

#[tokio::test]
async fn test_missing_report_is_skipped() {
    let server = MockServer::start().await;
    mount_index(
        &server,
        1,
        json!({ "items": ["/r/1", "/r/2", "/r/3"], "total_pages": 1 }),
    )
    .await;
    mount_report(&server, "/r/1", ResponseTemplate::new(200).set_body_json(json!({ "n": 1 }))).await;
    mount_report(&server, "/r/2", ResponseTemplate::new(404)).await;
    mount_report(&server, "/r/3", ResponseTemplate::new(410)).await;

    let source = Arc::new(source_for(&server));
    let mut stream = harvest(source, Arc::new(NoDedup), &no_pause(), Arc::new(SilentReporter))
        .await
        .unwrap();

    let mut reports = Vec::new();
    while let Some(result) = stream.next().await {
        reports.push(result.unwrap().item);
    }

    assert_eq!(reports, vec![json!({ "n": 1 })]);
}

#[tokio::test]
async fn test_server_error_halts_the_harvest() {
    let server = MockServer::start().await;
    mount_index(&server, 1, json!({ "items": ["/r/1"], "total_pages": 1 })).await;
    mount_report(&server, "/r/1", ResponseTemplate::new(503)).await;

    let source = Arc::new(source_for(&server));
    let mut stream = harvest(source, Arc::new(NoDedup), &no_pause(), Arc::new(SilentReporter))
        .await
        .unwrap();

    match stream.next().await {
        Some(Err(HarvestError::ItemFetch { item, source, .. })) => {
            assert_eq!(item, ItemRef::from(format!("{}/r/1", server.uri())));
            assert!(matches!(source, SourceError::Status { status: 503, .. }));
        }
        _ => panic!("expected a report fetch failure"),
    }
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_malformed_report_halts_the_harvest() {
    let server = MockServer::start().await;
    mount_index(&server, 1, json!({ "items": ["/r/1"], "total_pages": 1 })).await;
    mount_report(
        &server,
        "/r/1",
        ResponseTemplate::new(200).set_body_string("<html>not json</html>"),
    )
    .await;

    let source = Arc::new(source_for(&server));
    let mut stream = harvest(source, Arc::new(NoDedup), &no_pause(), Arc::new(SilentReporter))
        .await
        .unwrap();

    match stream.next().await {
        Some(Err(HarvestError::ItemFetch { source, .. })) => {
            assert!(matches!(source, SourceError::Malformed { .. }));
        }
        _ => panic!("expected a malformed report failure"),
    }
}

#[tokio::test]
async fn test_missing_index_page_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reports"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let source = Arc::new(source_for(&server));
    let result = harvest(
        source.clone(),
        Arc::new(NoDedup),
        &no_pause(),
        Arc::new(SilentReporter),
    )
    .await;

    match result {
        Err(HarvestError::IndexFetch { page, source: error }) => {
            assert_eq!(page, source.page_of(1));
            assert!(matches!(error, SourceError::Status { status: 404, .. }));
        }
        _ => panic!("expected an index fetch failure"),
    }
}

#[tokio::test]
async fn test_pipeline_over_http_persists_and_prints() {
    let server = MockServer::start().await;
    mount_index(&server, 1, json!({ "items": ["/r/1", "/r/2"], "total_pages": 2 })).await;
    mount_index(&server, 2, json!({ "items": ["/r/3"] })).await;
    for n in 1..=3 {
        mount_report(
            &server,
            &format!("/r/{}", n),
            ResponseTemplate::new(200).set_body_json(json!({ "n": n })),
        )
        .await;
    }

    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(Mutex::new(
        SqliteStorage::new(&dir.path().join("harvest.db")).unwrap(),
    ));
    let source = Arc::new(source_for(&server));
    let mut sink = TeeSink::new(
        StorageSink::new(storage.clone()),
        JsonLinesWriter::new(Vec::new()),
    );

    let summary = run_pipeline(
        source,
        storage.clone(),
        &no_pause(),
        &PipelineOptions::default(),
        &mut sink,
        Arc::new(SilentReporter),
    )
    .await
    .unwrap();

    assert_eq!(summary.delivered, 3);
    assert_eq!(
        summary.last_page,
        PageRef::from(format!("{}/reports?page=2", server.uri()))
    );
    assert_eq!(storage.lock().unwrap().count_items().unwrap(), 3);

    let output = String::from_utf8(sink.second.into_inner()).unwrap();
    let lines: Vec<serde_json::Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[2]["uri"], format!("{}/r/3", server.uri()));
    assert_eq!(lines[2]["report"], json!({ "n": 3 }));
}
