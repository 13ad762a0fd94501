//! Pipeline runs against a SQLite database: persistence, checkpoints, resumption

use crate::common::{harvest_config, MockListing};
use report_harvest::config::HarvestConfig;
use report_harvest::harvest::{
    run_pipeline, Harvested, ItemRef, PageRef, PipelineOptions, ResumeOptions, SilentReporter,
    StartOrigin, StartOverride,
};
use report_harvest::output::{
    CollectingSink, ItemSink, SinkError, SinkResult, StorageSink, TeeSink,
};
use report_harvest::storage::{RunStatus, SqliteStorage, Storage};
use report_harvest::HarvestError;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    storage: Arc<Mutex<SqliteStorage>>,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = SqliteStorage::new(&dir.path().join("harvest.db")).unwrap();
        Self {
            _dir: dir,
            storage: Arc::new(Mutex::new(storage)),
        }
    }

    fn options() -> PipelineOptions {
        PipelineOptions {
            resume: ResumeOptions::default(),
            config_hash: "test-hash".to_string(),
        }
    }

    async fn run(
        &self,
        source: &Arc<MockListing>,
        config: &HarvestConfig,
        options: &PipelineOptions,
    ) -> (Result<report_harvest::harvest::HarvestSummary, HarvestError>, Vec<String>) {
        let mut sink = TeeSink::new(
            StorageSink::new(self.storage.clone()),
            CollectingSink::default(),
        );
        let result = run_pipeline(
            source.clone(),
            self.storage.clone(),
            config,
            options,
            &mut sink,
            Arc::new(SilentReporter),
        )
        .await;

        let delivered = sink.second.items.into_iter().map(|h| h.item).collect();
        (result, delivered)
    }
}

/// Sink that refuses one report
struct RejectingSink {
    reject: ItemRef,
}

impl ItemSink<String> for RejectingSink {
    fn accept(&mut self, item: &Harvested<String>) -> SinkResult<()> {
        if item.item_ref == self.reject {
            return Err(SinkError::Rejected("Insert failed".to_string()));
        }
        Ok(())
    }
}

fn three_pages() -> MockListing {
    MockListing::new()
        .page(1, &["1", "2"], Some(3))
        .page(2, &["3", "4"], None)
        .page(3, &["5"], Some(3))
}

#[tokio::test(start_paused = true)]
async fn test_successful_run_persists_and_completes() {
    let fixture = Fixture::new();
    let source = Arc::new(three_pages());

    let (result, delivered) = fixture
        .run(&source, &harvest_config(2, 10), &Fixture::options())
        .await;

    let summary = result.unwrap();
    assert_eq!(delivered, vec!["1", "2", "3", "4", "5"]);
    assert_eq!(summary.delivered, 5);
    assert_eq!(summary.start.page_number, 1);
    assert_eq!(summary.start.origin, StartOrigin::Configured);
    assert_eq!(summary.last_page, PageRef::from("page-3"));

    let storage = fixture.storage.lock().unwrap();
    assert_eq!(storage.count_items().unwrap(), 5);
    assert_eq!(storage.count_items_for_run(summary.run_id).unwrap(), 5);
    let run = storage.get_run(summary.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "test-hash");
    assert!(run.finished_at.is_some());
    assert!(storage.get_checkpoint().unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_second_run_skips_persisted_reports() {
    let fixture = Fixture::new();
    let source = Arc::new(MockListing::new().page(1, &["1", "2", "3"], Some(1)));

    let (first, _) = fixture
        .run(&source, &harvest_config(2, 10), &Fixture::options())
        .await;
    assert_eq!(first.unwrap().delivered, 3);

    let (second, delivered) = fixture
        .run(&source, &harvest_config(2, 10), &Fixture::options())
        .await;
    let summary = second.unwrap();
    assert!(delivered.is_empty());
    assert_eq!(summary.delivered, 0);
    assert_eq!(summary.already_persisted, 3);
    assert_eq!(source.item_calls().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_report_failure_records_checkpoint() {
    let fixture = Fixture::new();
    let source = Arc::new(three_pages().failing_item("3", "Scraping failed"));

    let (result, delivered) = fixture
        .run(&source, &harvest_config(2, 10), &Fixture::options())
        .await;

    let error = result.unwrap_err();
    assert!(matches!(error, HarvestError::ItemFetch { .. }));
    assert_eq!(error.cause(), "Scraping failed");
    assert_eq!(delivered, vec!["1", "2"]);

    let storage = fixture.storage.lock().unwrap();
    let checkpoint = storage.get_checkpoint().unwrap().unwrap();
    assert_eq!(checkpoint.item_ref, Some(ItemRef::from("3")));
    assert_eq!(checkpoint.cause, "\"Scraping failed\"");
    assert_eq!(checkpoint.cause_message(), "Scraping failed");
    assert_eq!(checkpoint.page_ref, PageRef::from("page-2"));

    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_next_run_resumes_at_failing_report() {
    let fixture = Fixture::new();
    let broken = Arc::new(three_pages().failing_item("4", "Scraping failed"));
    let (result, _) = fixture
        .run(&broken, &harvest_config(2, 10), &Fixture::options())
        .await;
    assert!(result.is_err());

    let fixed = Arc::new(three_pages());
    let (result, delivered) = fixture
        .run(&fixed, &harvest_config(2, 10), &Fixture::options())
        .await;

    let summary = result.unwrap();
    assert_eq!(summary.start.origin, StartOrigin::Checkpoint);
    assert_eq!(summary.start.page_number, 2);
    assert_eq!(summary.start.resume_from, Some(ItemRef::from("4")));
    assert_eq!(delivered, vec!["4", "5"]);
    assert_eq!(fixed.index_calls(), vec![2, 3]);

    let storage = fixture.storage.lock().unwrap();
    assert!(storage.get_checkpoint().unwrap().is_none());
    assert_eq!(storage.count_items().unwrap(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_consumer_failure_records_checkpoint() {
    let fixture = Fixture::new();
    let source = Arc::new(three_pages());
    let mut sink = RejectingSink {
        reject: ItemRef::from("2"),
    };

    let result = run_pipeline(
        source.clone(),
        fixture.storage.clone(),
        &harvest_config(2, 10),
        &Fixture::options(),
        &mut sink,
        Arc::new(SilentReporter),
    )
    .await;

    match result {
        Err(HarvestError::Consumer { item, page, message }) => {
            assert_eq!(item, ItemRef::from("2"));
            assert_eq!(page, PageRef::from("page-1"));
            assert_eq!(message, "Report rejected: Insert failed");
        }
        other => panic!("expected a consumer failure, got {:?}", other.map(|s| s.run_id)),
    }

    let storage = fixture.storage.lock().unwrap();
    let checkpoint = storage.get_checkpoint().unwrap().unwrap();
    assert_eq!(checkpoint.item_ref, Some(ItemRef::from("2")));
    assert_eq!(checkpoint.cause_message(), "Report rejected: Insert failed");
    assert_eq!(checkpoint.page_ref, PageRef::from("page-1"));

    // Nothing was fetched after the rejection
    assert_eq!(source.index_calls(), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn test_index_failure_records_unattributed_checkpoint() {
    let fixture = Fixture::new();
    let source = Arc::new(
        MockListing::new()
            .page(1, &["1"], Some(3))
            .failing_page(2, "listing unavailable"),
    );

    let (result, delivered) = fixture
        .run(&source, &harvest_config(2, 10), &Fixture::options())
        .await;

    assert!(matches!(result, Err(HarvestError::IndexFetch { .. })));
    assert_eq!(delivered, vec!["1"]);

    let storage = fixture.storage.lock().unwrap();
    let checkpoint = storage.get_checkpoint().unwrap().unwrap();
    assert_eq!(checkpoint.item_ref, None);
    assert_eq!(checkpoint.cause_message(), "listing unavailable");
    assert_eq!(checkpoint.page_ref, PageRef::from("page-2"));
}

#[tokio::test(start_paused = true)]
async fn test_unattributed_checkpoint_resumes_whole_page() {
    let fixture = Fixture::new();
    fixture
        .storage
        .lock()
        .unwrap()
        .record_checkpoint(None, "listing unavailable", &PageRef::from("page-2"))
        .unwrap();
    let source = Arc::new(three_pages());

    let (result, delivered) = fixture
        .run(&source, &harvest_config(2, 10), &Fixture::options())
        .await;

    let summary = result.unwrap();
    assert_eq!(summary.start.resume_from, None);
    assert_eq!(delivered, vec!["3", "4", "5"]);
}

#[tokio::test(start_paused = true)]
async fn test_explicit_start_overrides_checkpoint() {
    let fixture = Fixture::new();
    fixture
        .storage
        .lock()
        .unwrap()
        .record_checkpoint(Some(&ItemRef::from("1")), "boom", &PageRef::from("page-1"))
        .unwrap();
    let source = Arc::new(three_pages());
    let options = PipelineOptions {
        resume: ResumeOptions {
            explicit: Some(StartOverride {
                page: PageRef::from("page-3"),
                item: ItemRef::from("5"),
            }),
            ignore_checkpoint: false,
        },
        config_hash: "test-hash".to_string(),
    };

    let (result, delivered) = fixture
        .run(&source, &harvest_config(2, 10), &options)
        .await;

    let summary = result.unwrap();
    assert_eq!(summary.start.origin, StartOrigin::Explicit);
    assert_eq!(delivered, vec!["5"]);
    assert_eq!(source.index_calls(), vec![3]);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_explicit_start_creates_no_run() {
    let fixture = Fixture::new();
    let source = Arc::new(three_pages());
    let options = PipelineOptions {
        resume: ResumeOptions {
            explicit: Some(StartOverride {
                page: PageRef::from("https://elsewhere.example.org/"),
                item: ItemRef::from("5"),
            }),
            ignore_checkpoint: false,
        },
        config_hash: "test-hash".to_string(),
    };

    let (result, _) = fixture
        .run(&source, &harvest_config(2, 10), &options)
        .await;

    assert!(matches!(result, Err(HarvestError::InvalidStart(_))));
    let storage = fixture.storage.lock().unwrap();
    assert!(storage.get_latest_run().unwrap().is_none());
    assert!(source.index_calls().is_empty());
}
