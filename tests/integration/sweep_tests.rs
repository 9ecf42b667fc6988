//! Integration tests for the sweep
//!
//! The HTTP path is exercised against a wiremock server. Scenario, ordering
//! and cancellation tests use a scripted in-process fetcher so every
//! identifier's response is known up front.

use async_trait::async_trait;
use range_sweep::config::{
    Config, CrawlerConfig, FetchConfig, OutputConfig, TransportErrorPolicy,
};
use range_sweep::crawler::{
    Coordinator, FetchResponse, Fetcher, HtmlClassifier, RunSummary, TransportError,
};
use range_sweep::state::{CancelFlag, Direction, HaltReason, RecordStatus};
use range_sweep::storage::{RunStatus, SqliteStorage, Storage};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// What the scripted fetcher returns for one identifier
#[derive(Debug, Clone, Copy)]
enum Scripted {
    Live,
    Dead,
    Blank,
    Gateway,
    Error,
}

/// Fetcher with a fixed response per identifier (unscripted ids are live)
struct ScriptedFetcher {
    script: HashMap<i64, Scripted>,
    delays: HashMap<i64, Duration>,
    calls: Mutex<Vec<i64>>,
    completed: Mutex<Vec<i64>>,
    cancel_on: Option<(i64, CancelFlag)>,
}

impl ScriptedFetcher {
    fn new(script: &[(i64, Scripted)]) -> Self {
        Self {
            script: script.iter().copied().collect(),
            delays: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            completed: Mutex::new(Vec::new()),
            cancel_on: None,
        }
    }

    /// Holds the response for `id` back by `millis`
    fn delaying(mut self, id: i64, millis: u64) -> Self {
        self.delays.insert(id, Duration::from_millis(millis));
        self
    }

    fn completed(&self) -> Vec<i64> {
        self.completed.lock().unwrap().clone()
    }

    fn cancelling_at(mut self, id: i64, cancel: CancelFlag) -> Self {
        self.cancel_on = Some((id, cancel));
        self
    }

    fn calls(&self) -> Vec<i64> {
        self.calls.lock().unwrap().clone()
    }

    fn sorted_calls(&self) -> Vec<i64> {
        let mut calls = self.calls();
        calls.sort_unstable();
        calls
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, id: i64) -> Result<FetchResponse, TransportError> {
        self.calls.lock().unwrap().push(id);

        if let Some((at, cancel)) = &self.cancel_on {
            if *at == id {
                cancel.request();
            }
        }

        if let Some(delay) = self.delays.get(&id) {
            tokio::time::sleep(*delay).await;
        }
        self.completed.lock().unwrap().push(id);

        match self.script.get(&id).copied().unwrap_or(Scripted::Live) {
            Scripted::Live => Ok(FetchResponse::new(
                200,
                format!(
                    "<html><body><div id=\"title\">Document {id}</div>\
                     <dl><dt>Type:</dt><dd>Video &gt; HD</dd>\
                     <dt>Size:</dt><dd>1.0 GiB (1073741824 Bytes)</dd>\
                     <dt>Seeders:</dt><dd>{id}</dd></dl></body></html>"
                ),
            )),
            Scripted::Dead => Ok(FetchResponse::new(404, "Not Found")),
            Scripted::Blank => Ok(FetchResponse::new(200, "   ")),
            Scripted::Gateway => Ok(FetchResponse::new(
                502,
                "<html><body><h1>502 Bad Gateway</h1></body></html>",
            )),
            Scripted::Error => Err(TransportError::Timeout),
        }
    }
}

/// Creates a test configuration walking `start..=end`
fn create_test_config(start: i64, end: i64, workers: u32, fail_limit: u32, db_path: &Path) -> Config {
    Config {
        crawler: CrawlerConfig {
            start_id: start,
            end_id: end,
            direction: None,
            workers,
            fail_limit,
            transport_errors: TransportErrorPolicy::Skip,
        },
        fetch: FetchConfig {
            url_template: Some("https://mirror.example/torrent/{id}".to_string()),
            mirror: None,
            user_agent: "Mozilla/5.0".to_string(),
            timeout_secs: 7,
        },
        output: OutputConfig {
            database_path: db_path.to_string_lossy().into_owned(),
            max_database_bytes: 20 * 1024 * 1024 * 1024,
        },
    }
}

fn db_path(dir: &TempDir) -> PathBuf {
    dir.path().join("archive.db")
}

fn coordinator(config: &Config, fetcher: Arc<ScriptedFetcher>, clean: bool) -> Coordinator {
    let storage = SqliteStorage::new(Path::new(&config.output.database_path)).unwrap();
    let fetcher: Arc<dyn Fetcher> = fetcher;
    let classifier = Arc::new(HtmlClassifier::new().unwrap());
    Coordinator::from_parts(config, "test-hash", storage, fetcher, classifier, clean).unwrap()
}

async fn sweep(config: &Config, fetcher: Arc<ScriptedFetcher>) -> RunSummary {
    coordinator(config, fetcher, false).run().await.unwrap()
}

fn open(config: &Config) -> SqliteStorage {
    SqliteStorage::new(Path::new(&config.output.database_path)).unwrap()
}

#[tokio::test]
async fn test_breaker_halts_mid_batch() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(100, 95, 6, 3, &db_path(&dir));
    let fetcher = Arc::new(ScriptedFetcher::new(&[
        (100, Scripted::Dead),
        (99, Scripted::Dead),
        (98, Scripted::Dead),
        (97, Scripted::Live),
        (96, Scripted::Dead),
        (95, Scripted::Dead),
    ]));

    let summary = sweep(&config, fetcher).await;
    assert_eq!(summary.reason, HaltReason::CircuitOpen);
    assert_eq!(summary.live_count, 0);

    let storage = open(&config);
    for id in [100, 99, 98] {
        assert!(storage.get_dead(id).unwrap().is_some(), "missing tombstone {}", id);
    }
    for id in [97, 96, 95] {
        assert!(storage.get_dead(id).unwrap().is_none());
        assert!(storage.get_record(id).unwrap().is_none());
    }
}

#[tokio::test]
async fn test_live_outcome_resets_streak() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(100, 95, 6, 3, &db_path(&dir));
    let fetcher = Arc::new(ScriptedFetcher::new(&[
        (100, Scripted::Dead),
        (99, Scripted::Dead),
        (98, Scripted::Live),
        (97, Scripted::Live),
        (96, Scripted::Dead),
        (95, Scripted::Dead),
    ]));

    let summary = sweep(&config, fetcher).await;
    assert_eq!(summary.reason, HaltReason::RangeExhausted);
    assert_eq!(summary.live_count, 2);
    assert_eq!(summary.streak, 2);
    assert_eq!(summary.final_pointer, 94);

    let storage = open(&config);
    let live = storage.get_record(98).unwrap().unwrap();
    assert_eq!(live.status, RecordStatus::Live);
    assert_eq!(live.title, "Document 98");
    assert_eq!(live.seeders, 98);
    assert_eq!(live.category.segments(), ["Video", "HD"]);
    assert_eq!(storage.count_dead().unwrap(), 4);
}

#[tokio::test]
async fn test_descending_visitation_order() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(100, 95, 1, 0, &db_path(&dir));
    let fetcher = Arc::new(ScriptedFetcher::new(&[]));

    sweep(&config, fetcher.clone()).await;
    assert_eq!(fetcher.calls(), vec![100, 99, 98, 97, 96, 95]);
}

#[tokio::test]
async fn test_outcomes_applied_in_direction_order_despite_completion_order() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(100, 95, 6, 3, &db_path(&dir));
    let script: Vec<(i64, Scripted)> = (95..=100).map(|id| (id, Scripted::Dead)).collect();
    let fetcher = Arc::new(
        ScriptedFetcher::new(&script)
            .delaying(100, 200)
            .delaying(99, 150)
            .delaying(98, 100)
            .delaying(97, 50),
    );

    let summary = sweep(&config, fetcher.clone()).await;

    // Low ids finished first, yet the breaker counts from 100 downwards
    let completed = fetcher.completed();
    assert_eq!(completed.len(), 6);
    assert_eq!(completed.last(), Some(&100));
    assert_eq!(summary.reason, HaltReason::CircuitOpen);
    assert_eq!(summary.final_pointer, 97);

    let storage = open(&config);
    for id in [100, 99, 98] {
        assert!(storage.get_dead(id).unwrap().is_some(), "missing tombstone {}", id);
    }
    for id in [97, 96, 95] {
        assert!(storage.get_dead(id).unwrap().is_none(), "unexpected tombstone {}", id);
    }
    assert_eq!(storage.resume_point(Direction::Descending).unwrap(), Some(98));
}

#[tokio::test]
async fn test_range_ending_at_last_identifier_terminates() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(i64::MAX - 2, i64::MAX, 2, 0, &db_path(&dir));
    let fetcher = Arc::new(ScriptedFetcher::new(&[]));

    let summary = tokio::time::timeout(Duration::from_secs(5), sweep(&config, fetcher.clone()))
        .await
        .expect("run over the last identifiers did not finish");
    assert_eq!(summary.reason, HaltReason::RangeExhausted);
    assert_eq!(fetcher.sorted_calls(), vec![i64::MAX - 2, i64::MAX - 1, i64::MAX]);
    assert_eq!(summary.final_pointer, i64::MAX);
    assert_eq!(summary.live_count, 3);

    // Resuming finds nothing left past the last identifier
    let again = Arc::new(ScriptedFetcher::new(&[]));
    let summary = tokio::time::timeout(Duration::from_secs(5), sweep(&config, again.clone()))
        .await
        .expect("resumed run did not finish");
    assert_eq!(summary.reason, HaltReason::RangeExhausted);
    assert!(again.calls().is_empty());
}

#[tokio::test]
async fn test_ascending_visitation_order() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(10, 14, 1, 0, &db_path(&dir));
    let fetcher = Arc::new(ScriptedFetcher::new(&[]));

    let summary = sweep(&config, fetcher.clone()).await;
    assert_eq!(fetcher.calls(), vec![10, 11, 12, 13, 14]);
    assert_eq!(summary.reason, HaltReason::RangeExhausted);
    assert_eq!(summary.live_count, 5);
}

#[tokio::test]
async fn test_batches_cover_range_exactly_once() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(1, 23, 5, 0, &db_path(&dir));
    let fetcher = Arc::new(ScriptedFetcher::new(&[]));

    sweep(&config, fetcher.clone()).await;
    assert_eq!(fetcher.sorted_calls(), (1..=23).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_resume_skips_persisted_identifiers() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(1, 10, 2, 3, &db_path(&dir));

    let first = Arc::new(ScriptedFetcher::new(&[
        (5, Scripted::Dead),
        (6, Scripted::Dead),
        (7, Scripted::Dead),
    ]));
    let summary = sweep(&config, first.clone()).await;
    assert_eq!(summary.reason, HaltReason::CircuitOpen);
    assert_eq!(
        open(&config).resume_point(Direction::Ascending).unwrap(),
        Some(7)
    );
    // 8 was fetched with 7 but never applied
    assert!(open(&config).get_record(8).unwrap().is_none());

    let second = Arc::new(ScriptedFetcher::new(&[]));
    let summary = sweep(&config, second.clone()).await;
    assert_eq!(summary.reason, HaltReason::RangeExhausted);
    assert_eq!(second.sorted_calls(), vec![8, 9, 10]);
    assert!(open(&config).get_record(8).unwrap().is_some());
}

#[tokio::test]
async fn test_resume_descending() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(20, 11, 3, 0, &db_path(&dir));

    let cancel = CancelFlag::new();
    let fetcher = Arc::new(ScriptedFetcher::new(&[]).cancelling_at(18, cancel.clone()));
    let summary = coordinator(&config, fetcher, false)
        .with_cancel_flag(cancel)
        .run()
        .await
        .unwrap();
    assert_eq!(summary.reason, HaltReason::Cancelled);
    assert_eq!(summary.final_pointer, 17);

    let second = Arc::new(ScriptedFetcher::new(&[]));
    sweep(&config, second.clone()).await;
    assert_eq!(second.sorted_calls(), (11..=17).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_cancel_before_start_fetches_nothing() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(1, 10, 4, 0, &db_path(&dir));
    let fetcher = Arc::new(ScriptedFetcher::new(&[]));

    let mut coordinator = coordinator(&config, fetcher.clone(), false);
    coordinator.cancel_flag().request();
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.reason, HaltReason::Cancelled);
    assert_eq!(summary.final_pointer, 1);
    assert!(fetcher.calls().is_empty());
    assert_eq!(open(&config).resume_point(Direction::Ascending).unwrap(), None);
}

#[tokio::test]
async fn test_cancel_commits_in_flight_batch() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(1, 6, 2, 0, &db_path(&dir));
    let cancel = CancelFlag::new();
    let fetcher = Arc::new(ScriptedFetcher::new(&[]).cancelling_at(3, cancel.clone()));

    let summary = coordinator(&config, fetcher.clone(), false)
        .with_cancel_flag(cancel)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.reason, HaltReason::Cancelled);
    assert_eq!(fetcher.sorted_calls(), vec![1, 2, 3, 4]);
    assert_eq!(summary.final_pointer, 5);

    let storage = open(&config);
    for id in 1..=4 {
        assert!(storage.get_record(id).unwrap().is_some(), "batch lost {}", id);
    }
    assert!(storage.get_record(5).unwrap().is_none());

    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Halted(HaltReason::Cancelled));
    assert_eq!(run.live_count, 4);
}

#[tokio::test]
async fn test_storage_limit_halts_before_fetching() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(1, 10, 4, 0, &db_path(&dir));
    config.output.max_database_bytes = 1;
    let fetcher = Arc::new(ScriptedFetcher::new(&[]));

    let summary = sweep(&config, fetcher.clone()).await;
    assert_eq!(summary.reason, HaltReason::StorageLimit);
    assert!(fetcher.calls().is_empty());

    let run = open(&config).get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Halted(HaltReason::StorageLimit));
}

#[tokio::test]
async fn test_transport_errors_skipped_by_default() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(1, 5, 5, 0, &db_path(&dir));
    let fetcher = Arc::new(ScriptedFetcher::new(&[(3, Scripted::Error)]));

    let summary = sweep(&config, fetcher).await;
    assert_eq!(summary.reason, HaltReason::RangeExhausted);

    let storage = open(&config);
    assert!(storage.get_record(3).unwrap().is_none());
    assert!(storage.get_dead(3).unwrap().is_none());
    assert!(storage.get_error(3).unwrap().is_none());
    assert_eq!(storage.resume_point(Direction::Ascending).unwrap(), Some(5));
}

#[tokio::test]
async fn test_recorded_errors_can_be_retried() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(1, 6, 3, 0, &db_path(&dir));
    config.crawler.transport_errors = TransportErrorPolicy::Record;

    let fetcher = Arc::new(ScriptedFetcher::new(&[
        (2, Scripted::Error),
        (5, Scripted::Error),
    ]));
    sweep(&config, fetcher).await;

    {
        let storage = open(&config);
        assert_eq!(storage.get_error(2).unwrap().unwrap().attempts, 1);
        assert_eq!(storage.count_errors().unwrap(), 2);
        assert!(storage.get_record(2).unwrap().is_none());
    }

    // 5 still fails, 2 recovers
    let retry = Arc::new(ScriptedFetcher::new(&[(5, Scripted::Error)]));
    let summary = coordinator(&config, retry.clone(), false)
        .retry_errors()
        .await
        .unwrap();

    assert_eq!(summary.reason, HaltReason::RangeExhausted);
    assert_eq!(summary.live_count, 1);
    assert_eq!(retry.sorted_calls(), vec![2, 5]);

    let storage = open(&config);
    assert!(storage.get_error(2).unwrap().is_none());
    assert_eq!(storage.get_record(2).unwrap().unwrap().status, RecordStatus::Live);
    assert_eq!(storage.get_error(5).unwrap().unwrap().attempts, 2);
}

#[tokio::test]
async fn test_errors_do_not_touch_streak() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(1, 6, 1, 2, &db_path(&dir));
    let fetcher = Arc::new(ScriptedFetcher::new(&[
        (1, Scripted::Dead),
        (2, Scripted::Error),
        (3, Scripted::Error),
        (4, Scripted::Blank),
        (5, Scripted::Dead),
    ]));

    let summary = sweep(&config, fetcher.clone()).await;
    assert_eq!(summary.reason, HaltReason::CircuitOpen);
    assert_eq!(fetcher.calls(), vec![1, 2, 3, 4]);

    let storage = open(&config);
    assert!(storage.get_dead(1).unwrap().is_some());
    assert_eq!(storage.get_record(4).unwrap().unwrap().status, RecordStatus::Blank);
}

#[tokio::test]
async fn test_zero_fail_limit_never_trips() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(1, 30, 7, 0, &db_path(&dir));
    let script: Vec<(i64, Scripted)> = (1..=30).map(|id| (id, Scripted::Dead)).collect();
    let fetcher = Arc::new(ScriptedFetcher::new(&script));

    let summary = sweep(&config, fetcher).await;
    assert_eq!(summary.reason, HaltReason::RangeExhausted);
    assert_eq!(summary.streak, 30);
    assert_eq!(open(&config).count_dead().unwrap(), 30);
}

#[tokio::test]
async fn test_gateway_and_blank_records() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(1, 3, 3, 0, &db_path(&dir));
    let fetcher = Arc::new(ScriptedFetcher::new(&[
        (1, Scripted::Gateway),
        (2, Scripted::Blank),
    ]));

    sweep(&config, fetcher).await;

    let storage = open(&config);
    let gateway = storage.get_record(1).unwrap().unwrap();
    assert_eq!(gateway.status, RecordStatus::Unknown);
    assert_eq!(gateway.title, "502 Bad Gateway");
    assert_eq!(storage.get_record(2).unwrap().unwrap().status, RecordStatus::Blank);
    assert_eq!(storage.get_record(3).unwrap().unwrap().status, RecordStatus::Live);
}

#[tokio::test]
async fn test_clean_discards_previous_state() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(1, 4, 4, 0, &db_path(&dir));
    sweep(&config, Arc::new(ScriptedFetcher::new(&[]))).await;

    let fetcher = Arc::new(ScriptedFetcher::new(&[]));
    let summary = coordinator(&config, fetcher.clone(), true)
        .run()
        .await
        .unwrap();

    assert_eq!(fetcher.sorted_calls(), vec![1, 2, 3, 4]);
    assert_eq!(summary.reason, HaltReason::RangeExhausted);
}

#[tokio::test]
async fn test_second_run_on_same_coordinator_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(1, 2, 2, 0, &db_path(&dir));
    let mut coordinator = coordinator(&config, Arc::new(ScriptedFetcher::new(&[])), false);

    coordinator.run().await.unwrap();
    assert!(coordinator.run().await.is_err());
}

const LIVE_PAGE: &str = r#"<html><body>
<div id="title">Ubuntu 24.04 Desktop</div>
<dl>
  <dt>Type:</dt><dd>Applications &gt; UNIX</dd>
  <dt>Size:</dt><dd>5.7 GiB (6114656256 Bytes)</dd>
  <dt>Seeders:</dt><dd>311</dd>
</dl>
<a href="magnet:?xt=urn:btih:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa">Magnet</a>
</body></html>"#;

#[tokio::test]
async fn test_http_sweep_end_to_end() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/torrent/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LIVE_PAGE))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/torrent/2"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", "/torrent/1")
                .set_body_string("Moved"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/torrent/3"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/torrent/4"))
        .respond_with(
            ResponseTemplate::new(502)
                .set_body_string("<html><head><title>502</title></head><body><h1>502 Bad Gateway</h1></body></html>"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/torrent/5"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/torrent/6"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(LIVE_PAGE)
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(1, 6, 6, 0, &db_path(&dir));
    config.fetch.url_template = Some(format!("{}/torrent/{{id}}", mock_server.uri()));
    config.fetch.timeout_secs = 1;
    config.crawler.transport_errors = TransportErrorPolicy::Record;

    let mut coordinator = Coordinator::new(&config, "test-hash", false).unwrap();
    let summary = coordinator.run().await.unwrap();
    assert_eq!(summary.reason, HaltReason::RangeExhausted);
    assert_eq!(summary.live_count, 1);
    drop(coordinator);

    let storage = open(&config);

    let live = storage.get_record(1).unwrap().unwrap();
    assert_eq!(live.status, RecordStatus::Live);
    assert_eq!(live.title, "Ubuntu 24.04 Desktop");
    assert_eq!(live.category.to_string(), "Applications > UNIX");
    assert_eq!(live.size, "5.7 GiB (6114656256 Bytes");
    assert_eq!(live.seeders, 311);
    assert!(live.magnet.unwrap().starts_with("magnet:?xt=urn:btih:"));

    assert!(storage.get_dead(2).unwrap().is_some());
    assert_eq!(storage.get_record(3).unwrap().unwrap().status, RecordStatus::Blank);

    let gateway = storage.get_record(4).unwrap().unwrap();
    assert_eq!(gateway.status, RecordStatus::Unknown);
    assert_eq!(gateway.title, "502 Bad Gateway");

    assert!(storage.get_dead(5).unwrap().is_some());

    assert!(storage.get_record(6).unwrap().is_none());
    assert!(storage.get_error(6).unwrap().is_some());

    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.config_hash, "test-hash");
    assert_eq!(run.live_count, 1);
}
