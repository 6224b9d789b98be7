//! End-to-end runs of the ETL session against the in-memory source and
//! index, with a JSON-file state backend in a temp directory.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use cinesync_engine::memory::FilmRecord;
use cinesync_engine::{
    run_forever, run_once, EtlSettings, MemoryConnector, MemorySource, PipelineError,
};
use cinesync_index::{DocumentSink, MemoryIndex};
use cinesync_state::watermark::{get_status, get_watermark};
use cinesync_state::{JsonFileStateBackend, StateBackend};
use cinesync_types::config::IndexNames;
use cinesync_types::{EtlStatus, GenreRow, PersonRow, WatermarkKey};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn id(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

fn settings(batch_size: usize, pause: Duration) -> EtlSettings {
    EtlSettings {
        indices: IndexNames::default(),
        batch_size,
        pause,
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    state: Arc<dyn StateBackend>,
    source: MemorySource,
    index: Arc<MemoryIndex>,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let state = JsonFileStateBackend::open(&dir.path().join("state/etl_state.json")).unwrap();
        Self {
            _dir: dir,
            state: Arc::new(state),
            source: MemorySource::new(),
            index: Arc::new(MemoryIndex::new()),
        }
    }

    fn connector(&self) -> MemoryConnector {
        let sink: Arc<dyn DocumentSink> = self.index.clone();
        MemoryConnector::new(self.source.clone(), sink)
    }

    fn watermark(&self, key: WatermarkKey) -> Option<DateTime<Utc>> {
        get_watermark(self.state.as_ref(), key).unwrap()
    }

    fn status(&self) -> Option<EtlStatus> {
        get_status(self.state.as_ref()).unwrap()
    }

    fn add_film(&self, n: u128, title: &str, modified: i64) {
        self.source.upsert_film(FilmRecord {
            id: id(n),
            title: title.to_string(),
            description: Some(format!("About {title}")),
            rating: Some(7.5),
            modified: ts(modified),
        });
    }

    fn add_genre(&self, n: u128, name: &str, modified: i64) {
        self.source.upsert_genre(GenreRow {
            id: id(n),
            name: name.to_string(),
            description: None,
            modified: ts(modified),
        });
    }

    fn add_person(&self, n: u128, name: &str, modified: i64) {
        self.source.upsert_person(PersonRow {
            id: id(n),
            full_name: name.to_string(),
            modified: ts(modified),
        });
    }

    /// One film with two genres and a director, an actor and a writer.
    fn seed_single_film(&self) {
        self.add_film(1, "The Star", 1_000);
        self.add_genre(10, "Drama", 100);
        self.add_genre(11, "Comedy", 110);
        self.add_person(20, "Dana Director", 200);
        self.add_person(21, "Alex Actor", 210);
        self.add_person(22, "Wren Writer", 220);
        self.source.link_genre(id(1), id(10));
        self.source.link_genre(id(1), id(11));
        self.source.link_person(id(1), id(20), "director");
        self.source.link_person(id(1), id(21), "actor");
        self.source.link_person(id(1), id(22), "writer");
    }
}

#[tokio::test]
async fn test_first_run_indexes_everything_and_commits_watermarks() {
    let h = Harness::new();
    h.seed_single_film();

    let report = run_once(&h.connector(), h.state.clone(), settings(500, Duration::ZERO))
        .await
        .unwrap();
    assert_eq!(report.films, 1);
    assert_eq!(report.persons, 3);
    assert_eq!(report.genres, 2);

    // films, persons and genres: one bulk call each at batch size 500
    let batches = h.index.bulk_batches();
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[0], vec![id(1).to_string()]);

    let doc = h.index.document("movies", &id(1).to_string()).unwrap();
    assert_eq!(doc["genres"].as_array().unwrap().len(), 2);
    assert_eq!(doc["directors"].as_array().unwrap().len(), 1);
    assert_eq!(doc["actors"].as_array().unwrap().len(), 1);
    assert_eq!(doc["writers"].as_array().unwrap().len(), 1);
    assert_eq!(doc["actors_names"][0], "Alex Actor");
    assert_eq!(h.index.len("persons"), 3);
    assert_eq!(h.index.len("genres"), 2);

    assert_eq!(h.watermark(WatermarkKey::Filmwork), Some(ts(1_000)));
    assert_eq!(h.watermark(WatermarkKey::Genre), Some(ts(110)));
    assert_eq!(h.watermark(WatermarkKey::Person), Some(ts(220)));
    assert_eq!(h.watermark(WatermarkKey::PersonIndex), Some(ts(220)));
    assert_eq!(h.watermark(WatermarkKey::GenreIndex), Some(ts(110)));
    assert_eq!(h.status(), Some(EtlStatus::Stopped));
    assert_eq!(h.source.close_count(), 1);
}

#[tokio::test]
async fn test_second_run_without_changes_is_a_no_op() {
    let h = Harness::new();
    h.seed_single_film();
    run_once(&h.connector(), h.state.clone(), settings(500, Duration::ZERO))
        .await
        .unwrap();
    let calls_after_first = h.index.bulk_batches().len();

    let report = run_once(&h.connector(), h.state.clone(), settings(500, Duration::ZERO))
        .await
        .unwrap();
    assert_eq!(report, Default::default());
    assert_eq!(h.index.bulk_batches().len(), calls_after_first);
    assert_eq!(h.watermark(WatermarkKey::Filmwork), Some(ts(1_000)));
}

#[tokio::test]
async fn test_genre_edit_reindexes_every_linked_film() {
    let h = Harness::new();
    h.add_genre(10, "Drama", 100);
    for n in 1..=4 {
        h.add_film(n, &format!("Film {n}"), 1_000 + i64::try_from(n).unwrap());
        if n != 4 {
            h.source.link_genre(id(n), id(10));
        }
    }
    run_once(&h.connector(), h.state.clone(), settings(500, Duration::ZERO))
        .await
        .unwrap();

    h.add_genre(10, "Melodrama", 5_000);
    let report = run_once(&h.connector(), h.state.clone(), settings(500, Duration::ZERO))
        .await
        .unwrap();
    assert_eq!(report.films, 3);
    assert_eq!(report.genres, 1);
    for n in 1..=3 {
        let doc = h.index.document("movies", &id(n).to_string()).unwrap();
        assert_eq!(doc["genres"][0]["name"], "Melodrama", "film {n}");
    }
    let untouched = h.index.document("movies", &id(4).to_string()).unwrap();
    assert!(untouched["genres"].as_array().unwrap().is_empty());
    assert_eq!(h.watermark(WatermarkKey::Genre), Some(ts(5_000)));
    assert_eq!(h.watermark(WatermarkKey::Filmwork), Some(ts(1_004)));
}

#[tokio::test]
async fn test_person_rename_reindexes_every_linked_film() {
    let h = Harness::new();
    h.add_person(20, "Sam Star", 100);
    h.add_person(21, "Other Actor", 110);
    for n in 1..=3 {
        h.add_film(n, &format!("Film {n}"), 1_000 + i64::try_from(n).unwrap());
    }
    h.source.link_person(id(1), id(20), "actor");
    h.source.link_person(id(2), id(20), "actor");
    h.source.link_person(id(3), id(21), "actor");
    run_once(&h.connector(), h.state.clone(), settings(500, Duration::ZERO))
        .await
        .unwrap();
    let first_run_batches = h.index.bulk_batches().len();

    h.add_person(20, "Samantha Star", 5_000);
    let report = run_once(&h.connector(), h.state.clone(), settings(500, Duration::ZERO))
        .await
        .unwrap();
    assert_eq!(report.films, 2);
    assert_eq!(report.persons, 1);

    let film_batch = &h.index.bulk_batches()[first_run_batches];
    assert_eq!(film_batch, &vec![id(1).to_string(), id(2).to_string()]);
    for n in 1..=2 {
        let doc = h.index.document("movies", &id(n).to_string()).unwrap();
        assert_eq!(doc["actors"][0]["name"], "Samantha Star", "film {n}");
        assert_eq!(doc["actors_names"], serde_json::json!(["Samantha Star"]), "film {n}");
    }
    let untouched = h.index.document("movies", &id(3).to_string()).unwrap();
    assert_eq!(untouched["actors_names"], serde_json::json!(["Other Actor"]));

    assert_eq!(h.watermark(WatermarkKey::Person), Some(ts(5_000)));
    assert_eq!(h.watermark(WatermarkKey::PersonIndex), Some(ts(5_000)));
    assert_eq!(h.watermark(WatermarkKey::Filmwork), Some(ts(1_003)));
}

#[tokio::test]
async fn test_batches_follow_configured_size() {
    let h = Harness::new();
    for n in 1..=5 {
        h.add_film(n, &format!("Film {n}"), 1_000 + i64::try_from(n).unwrap());
    }
    run_once(&h.connector(), h.state.clone(), settings(2, Duration::ZERO))
        .await
        .unwrap();
    let sizes: Vec<usize> = h.index.bulk_batches().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![2, 2, 1]);
}

#[tokio::test]
async fn test_bulk_failure_leaves_watermarks_uncommitted() {
    let h = Harness::new();
    h.seed_single_film();
    h.index.fail_bulk_from(0);

    let err = run_once(&h.connector(), h.state.clone(), settings(500, Duration::ZERO))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Load(_)), "got: {err}");
    for key in WatermarkKey::ALL {
        assert_eq!(h.watermark(key), None, "{key}");
    }
    assert_eq!(h.status(), Some(EtlStatus::Stopped));
    assert_eq!(h.source.close_count(), 1);
}

#[tokio::test]
async fn test_invalid_film_aborts_only_the_films_sub_pipeline() {
    let h = Harness::new();
    h.add_film(1, "Fine", 1_000);
    h.add_film(2, "   ", 2_000);
    h.add_person(20, "Someone", 100);
    h.add_genre(10, "Drama", 110);

    let err = run_once(&h.connector(), h.state.clone(), settings(500, Duration::ZERO))
        .await
        .unwrap_err();
    match err {
        PipelineError::Validation(doc) => {
            assert_eq!(doc.entity, "film");
            assert_eq!(doc.id, id(2));
        }
        other => panic!("expected validation failure, got {other}"),
    }
    assert_eq!(h.watermark(WatermarkKey::Filmwork), None);
    assert_eq!(h.index.len("movies"), 0);

    // persons and genres still load and commit
    assert_eq!(h.index.len("persons"), 1);
    assert_eq!(h.index.len("genres"), 1);
    assert_eq!(h.watermark(WatermarkKey::PersonIndex), Some(ts(100)));
    assert_eq!(h.watermark(WatermarkKey::GenreIndex), Some(ts(110)));
    assert_eq!(h.status(), Some(EtlStatus::Stopped));

    // a new genre is picked up while the bad film is still pending
    h.add_genre(11, "Comedy", 120);
    let err = run_once(&h.connector(), h.state.clone(), settings(500, Duration::ZERO))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)), "got: {err}");
    assert_eq!(h.index.len("genres"), 2);
    assert_eq!(h.watermark(WatermarkKey::GenreIndex), Some(ts(120)));
    assert_eq!(h.watermark(WatermarkKey::Filmwork), None);
}

#[tokio::test]
async fn test_high_rating_and_blank_credit_are_indexed() {
    let h = Harness::new();
    h.source.upsert_film(FilmRecord {
        id: id(1),
        title: "Overrated".to_string(),
        description: None,
        rating: Some(10.5),
        modified: ts(1_000),
    });
    h.add_person(20, "", 100);
    h.add_genre(10, "Drama", 110);
    h.source.link_person(id(1), id(20), "actor");
    h.source.link_genre(id(1), id(10));

    // the blank person is rejected by the persons index only
    let err = run_once(&h.connector(), h.state.clone(), settings(500, Duration::ZERO))
        .await
        .unwrap_err();
    match err {
        PipelineError::Validation(doc) => assert_eq!(doc.entity, "person"),
        other => panic!("expected person validation failure, got {other}"),
    }

    let doc = h.index.document("movies", &id(1).to_string()).unwrap();
    assert_eq!(doc["imdb_rating"], 10.5);
    assert_eq!(doc["actors"].as_array().unwrap().len(), 1);
    assert_eq!(h.watermark(WatermarkKey::Filmwork), Some(ts(1_000)));
    assert_eq!(h.index.len("genres"), 1);
    assert_eq!(h.watermark(WatermarkKey::PersonIndex), None);
}

#[tokio::test]
async fn test_unreachable_sink_stops_and_closes_source() {
    let h = Harness::new();
    h.seed_single_film();
    let connector = h.connector().with_sink_down();

    let err = run_once(&connector, h.state.clone(), settings(500, Duration::ZERO))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Connect { target: "elasticsearch", .. }));
    assert_eq!(h.status(), Some(EtlStatus::Stopped));
    assert_eq!(h.source.close_count(), 1);
    assert!(h.index.bulk_batches().is_empty());
}

#[tokio::test]
async fn test_run_forever_propagates_entry_failure() {
    let h = Harness::new();
    let connector = h.connector().with_source_down();
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        run_forever(
            &connector,
            h.state.clone(),
            settings(500, Duration::from_millis(1)),
            CancellationToken::new(),
        ),
    )
    .await
    .expect("entry failure must end the loop");
    assert!(matches!(result, Err(PipelineError::Connect { target: "postgres", .. })));
    assert_eq!(h.status(), Some(EtlStatus::Stopped));
}

#[tokio::test]
async fn test_cancellation_runs_cleanup() {
    let h = Harness::new();
    h.seed_single_film();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    tokio::time::timeout(
        Duration::from_secs(5),
        run_forever(
            &h.connector(),
            h.state.clone(),
            settings(500, Duration::from_secs(3_600)),
            cancel,
        ),
    )
    .await
    .expect("cancellation must end the loop")
    .unwrap();

    assert_eq!(h.status(), Some(EtlStatus::Stopped));
    assert_eq!(h.source.close_count(), 1);
    assert_eq!(h.watermark(WatermarkKey::Filmwork), Some(ts(1_000)));
}

#[tokio::test]
async fn test_failed_iterations_are_retried_after_pause() {
    let h = Harness::new();
    h.seed_single_film();
    h.index.fail_bulk_from(0);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    tokio::time::timeout(
        Duration::from_secs(5),
        run_forever(
            &h.connector(),
            h.state.clone(),
            settings(500, Duration::from_millis(10)),
            cancel,
        ),
    )
    .await
    .expect("cancellation must end the loop")
    .unwrap();

    assert!(h.source.close_count() >= 2, "closes: {}", h.source.close_count());
    assert_eq!(h.watermark(WatermarkKey::Filmwork), None);
    assert_eq!(h.status(), Some(EtlStatus::Stopped));
}

#[tokio::test]
async fn test_state_file_is_flat_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("etl_state.json");
    let state: Arc<dyn StateBackend> = Arc::new(JsonFileStateBackend::open(&path).unwrap());
    let source = MemorySource::new();
    source.upsert_genre(GenreRow {
        id: id(10),
        name: "Drama".into(),
        description: None,
        modified: ts(100),
    });
    let index: Arc<dyn DocumentSink> = Arc::new(MemoryIndex::new());
    run_once(
        &MemoryConnector::new(source, index),
        state,
        settings(500, Duration::ZERO),
    )
    .await
    .unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let object = raw.as_object().unwrap();
    assert_eq!(object["etl_process"], "stopped");
    assert_eq!(object["genre"], "1970-01-01T00:01:40Z");
    assert_eq!(object["genre_index"], "1970-01-01T00:01:40Z");
    assert!(object.values().all(serde_json::Value::is_string));
}
