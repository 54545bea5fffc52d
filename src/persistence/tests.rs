use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::runtime::Handle;

use super::*;
use crate::model::{Annotation, Category, PersistencePayload};

const QUIET: Duration = Duration::from_millis(800);

#[derive(Default)]
struct RecordingRemote {
    stored: Option<PersistencePayload>,
    fail_push: bool,
    pushed: Mutex<Vec<PersistencePayload>>,
}

impl RecordingRemote {
    fn serving(payload: PersistencePayload) -> Self {
        Self {
            stored: Some(payload),
            ..Self::default()
        }
    }

    fn failing() -> Self {
        Self {
            fail_push: true,
            ..Self::default()
        }
    }

    fn pushed(&self) -> Vec<PersistencePayload> {
        self.pushed.lock().expect("push log lock").clone()
    }
}

#[async_trait]
impl RemoteSync for RecordingRemote {
    async fn fetch(&self) -> Result<PersistencePayload> {
        self.stored
            .clone()
            .ok_or_else(|| anyhow!("remote unreachable"))
    }

    async fn push(&self, payload: &PersistencePayload) -> Result<()> {
        if self.fail_push {
            return Err(anyhow!("remote rejected push"));
        }
        self.pushed.lock().expect("push log lock").push(payload.clone());
        Ok(())
    }
}

fn payload_with_category(name: &str) -> PersistencePayload {
    PersistencePayload {
        categories: vec![Category {
            id: format!("cat-{name}"),
            name: name.to_string(),
        }],
        annotations: BTreeMap::new(),
    }
}

fn debouncer(remote: &Arc<RecordingRemote>) -> SyncDebouncer {
    SyncDebouncer::new(remote.clone(), Handle::current(), QUIET)
}

#[test]
fn sqlite_store_round_trips_annotation_state() {
    let store = SqliteStore::open_in_memory().expect("in-memory db");
    assert_eq!(store.read().expect("read empty state"), None);

    let submitted_at = "2026-01-02T03:04:05Z"
        .parse::<DateTime<Utc>>()
        .expect("valid timestamp");
    let mut payload = payload_with_category("Wrong answer");
    payload.annotations.insert(
        "r-1".to_string(),
        Annotation {
            description: "misread the constraints".to_string(),
            category_id: Some("cat-Wrong answer".to_string()),
            submitted_at: Some(submitted_at),
        },
    );

    store.write(&payload).expect("write state");
    store.write(&payload).expect("overwrite state");
    assert_eq!(store.read().expect("read state"), Some(payload));
}

#[test]
fn sqlite_store_records_dataset_provenance() {
    let store = SqliteStore::open_in_memory().expect("in-memory db");
    assert_eq!(
        store.metadata("db_schema_version").expect("schema version"),
        Some("0.1.0".to_string())
    );
    assert_eq!(store.dataset("problems").expect("missing dataset"), None);

    let record = DatasetRecord {
        path: "/data/problems.json".to_string(),
        sha256: "ab".repeat(32),
        record_count: 12,
        loaded_at: "2026-01-02T03:04:05Z".to_string(),
    };
    store
        .record_datasets(&[("problems", &record)])
        .expect("record dataset");

    assert_eq!(store.dataset("problems").expect("read dataset"), Some(record));
    assert_eq!(store.dataset("responses").expect("other kind"), None);
}

#[test]
fn sqlite_store_records_several_datasets_together() {
    let store = SqliteStore::open_in_memory().expect("in-memory db");
    let problems = DatasetRecord {
        path: "/data/problems.json".to_string(),
        sha256: "aa".repeat(32),
        record_count: 3,
        loaded_at: "2026-01-02T03:04:05Z".to_string(),
    };
    let responses = DatasetRecord {
        path: "/data/responses.jsonl".to_string(),
        sha256: "bb".repeat(32),
        record_count: 9,
        loaded_at: "2026-01-02T03:04:05Z".to_string(),
    };

    store
        .record_datasets(&[("problems", &problems), ("responses", &responses)])
        .expect("record datasets");

    assert_eq!(store.dataset("problems").expect("problems"), Some(problems));
    assert_eq!(store.dataset("responses").expect("responses"), Some(responses));
}

#[test]
fn sqlite_store_tracks_annotation_write_time() {
    let store = SqliteStore::open_in_memory().expect("in-memory db");
    assert_eq!(store.annotations_updated_at().expect("no writes yet"), None);

    let before = Utc::now() - chrono::Duration::seconds(1);
    store
        .write(&payload_with_category("Timed"))
        .expect("write state");
    let after = Utc::now() + chrono::Duration::seconds(1);

    let updated_at = store
        .annotations_updated_at()
        .expect("read timestamp")
        .expect("timestamp recorded");
    assert!(before <= updated_at && updated_at <= after);
}

#[test]
fn sqlite_store_persists_across_reopen() {
    let dir = std::env::temp_dir().join(format!("trace-review-{}", uuid::Uuid::new_v4().simple()));
    let path = dir.join("nested").join("review.sqlite");
    let payload = payload_with_category("Timeout");

    {
        let store = SqliteStore::open(&path).expect("open new db");
        store.write(&payload).expect("write state");
    }
    let reopened = SqliteStore::open(&path).expect("reopen db");
    assert_eq!(reopened.read().expect("read state"), Some(payload));

    drop(reopened);
    std::fs::remove_dir_all(&dir).expect("clean up temp dir");
}

#[test]
fn gateway_load_recovers_from_unreadable_local_state() {
    struct Broken;
    impl LocalStore for Broken {
        fn read(&self) -> Result<Option<PersistencePayload>> {
            Err(anyhow!("corrupt"))
        }
        fn write(&self, _payload: &PersistencePayload) -> Result<()> {
            Err(anyhow!("read-only"))
        }
    }

    let mut gateway = PersistenceGateway::local_only(Box::new(Broken));
    assert_eq!(gateway.load(), PersistencePayload::default());
    gateway.save(&payload_with_category("Ignored"));
}

#[tokio::test(start_paused = true)]
async fn rapid_saves_coalesce_into_one_push() {
    let remote = Arc::new(RecordingRemote::default());
    let mut sync = debouncer(&remote);

    for name in ["first", "second", "third"] {
        sync.schedule(payload_with_category(name));
        tokio::time::sleep(QUIET / 4).await;
    }
    assert!(sync.is_pending());
    assert!(remote.pushed().is_empty());

    tokio::time::sleep(QUIET * 2).await;

    assert_eq!(remote.pushed(), vec![payload_with_category("third")]);
    assert!(!sync.is_pending());
}

#[tokio::test(start_paused = true)]
async fn flush_pushes_immediately_and_cancels_timer() {
    let remote = Arc::new(RecordingRemote::default());
    let mut sync = debouncer(&remote);

    sync.schedule(payload_with_category("pending"));
    sync.flush().await;
    assert_eq!(remote.pushed(), vec![payload_with_category("pending")]);

    tokio::time::sleep(QUIET * 2).await;
    assert_eq!(remote.pushed().len(), 1);

    sync.flush().await;
    assert_eq!(remote.pushed().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn flush_after_timer_fired_does_not_push_again() {
    let remote = Arc::new(RecordingRemote::default());
    let mut sync = debouncer(&remote);

    sync.schedule(payload_with_category("sent"));
    tokio::time::sleep(QUIET * 2).await;
    sync.flush().await;

    assert_eq!(remote.pushed().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_push_is_swallowed() {
    let remote = Arc::new(RecordingRemote::failing());
    let mut sync = debouncer(&remote);

    sync.schedule(payload_with_category("lost"));
    tokio::time::sleep(QUIET * 2).await;
    sync.schedule(payload_with_category("also lost"));
    sync.flush().await;

    assert!(remote.pushed().is_empty());
    assert!(!sync.is_pending());
}

#[tokio::test(start_paused = true)]
async fn gateway_writes_locally_then_syncs_after_quiet_period() {
    let local = MemoryStore::default();
    let remote = Arc::new(RecordingRemote::default());
    let mut gateway = PersistenceGateway::with_remote(Box::new(local.clone()), debouncer(&remote));

    gateway.save(&payload_with_category("one"));
    gateway.save(&payload_with_category("two"));
    assert_eq!(local.writes(), 2);
    assert_eq!(local.stored(), Some(payload_with_category("two")));
    assert!(remote.pushed().is_empty());

    tokio::time::sleep(QUIET * 2).await;
    assert_eq!(remote.pushed(), vec![payload_with_category("two")]);
}

#[tokio::test(start_paused = true)]
async fn remote_state_supersedes_local_and_is_mirrored() {
    let local = MemoryStore::seeded(payload_with_category("local"));
    let remote = Arc::new(RecordingRemote::serving(payload_with_category("remote")));
    let gateway = PersistenceGateway::with_remote(Box::new(local.clone()), debouncer(&remote));

    let loaded = gateway.load_with_remote().await;

    assert_eq!(loaded, payload_with_category("remote"));
    assert_eq!(local.stored(), Some(payload_with_category("remote")));
}

#[tokio::test(start_paused = true)]
async fn unreachable_remote_falls_back_to_local() {
    let local = MemoryStore::seeded(payload_with_category("local"));
    let remote = Arc::new(RecordingRemote::default());
    let gateway = PersistenceGateway::with_remote(Box::new(local.clone()), debouncer(&remote));

    let loaded = gateway.load_with_remote().await;

    assert_eq!(loaded, payload_with_category("local"));
    assert_eq!(local.writes(), 0);
}

#[tokio::test(start_paused = true)]
async fn local_only_gateway_ignores_flush() {
    let local = MemoryStore::default();
    let mut gateway = PersistenceGateway::local_only(Box::new(local.clone()));

    gateway.save(&payload_with_category("only"));
    gateway.flush().await;

    assert_eq!(gateway.load_with_remote().await, payload_with_category("only"));
    assert_eq!(local.writes(), 1);
}

/// Serves one canned HTTP response and returns the raw request it received.
fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind local listener");
    let url = format!("http://{}/state", listener.local_addr().expect("local addr"));
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept connection");
        let request = read_request(&mut stream);
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream
            .write_all(response.as_bytes())
            .expect("write response");
        request
    });
    (url, handle)
}

fn read_request(stream: &mut TcpStream) -> String {
    let mut raw = Vec::new();
    let mut buf = [0_u8; 1024];
    loop {
        let count = stream.read(&mut buf).expect("read request");
        if count == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..count]);

        let text = String::from_utf8_lossy(&raw);
        let Some(header_end) = text.find("\r\n\r\n") else {
            continue;
        };
        let content_length = text[..header_end]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if raw.len() >= header_end + 4 + content_length {
            break;
        }
    }
    String::from_utf8_lossy(&raw).into_owned()
}

fn http_remote(url: &str) -> HttpRemote {
    HttpRemote::new(url, Duration::from_secs(5)).expect("build remote client")
}

#[tokio::test]
async fn http_remote_fetch_decodes_successful_response() {
    let (url, server) = serve_once(
        "200 OK",
        r#"{"categories":[{"id":"cat-a","name":"A"}],"annotations":{"r-1":{"description":"ok"}}}"#,
    );

    let payload = http_remote(&url).fetch().await.expect("fetch succeeds");
    let request = server.join().expect("server thread");

    assert!(request.starts_with("GET /state "));
    assert_eq!(payload.categories.len(), 1);
    assert_eq!(
        payload.annotations.get("r-1").map(|a| a.description.as_str()),
        Some("ok")
    );
}

#[tokio::test]
async fn http_remote_fetch_rejects_error_status() {
    let (url, server) = serve_once("500 Internal Server Error", "{}");

    let err = http_remote(&url)
        .fetch()
        .await
        .expect_err("error status must fail");
    server.join().expect("server thread");

    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn http_remote_push_posts_payload_json() {
    let (url, server) = serve_once("204 No Content", "");

    http_remote(&url)
        .push(&payload_with_category("Pushed"))
        .await
        .expect("push succeeds");
    let request = server.join().expect("server thread");

    assert!(request.starts_with("POST /state "));
    let body = request
        .split_once("\r\n\r\n")
        .map(|(_, body)| body)
        .expect("request body");
    let sent: PersistencePayload = serde_json::from_str(body).expect("json body");
    assert_eq!(sent, payload_with_category("Pushed"));
}

#[tokio::test]
async fn http_remote_push_rejects_error_status() {
    let (url, server) = serve_once("503 Service Unavailable", "");

    let err = http_remote(&url)
        .push(&payload_with_category("Rejected"))
        .await
        .expect_err("error status must fail");
    server.join().expect("server thread");

    assert!(err.to_string().contains("503"));
}
