// Shared test helpers: scripted collaborators and response builders

#![allow(dead_code)]

use async_trait::async_trait;
use cf_analytics_exporter::admission::AdmissionCheck;
use cf_analytics_exporter::analytics_api::AnalyticsSource;
use cf_analytics_exporter::clock::Clock;
use cf_analytics_exporter::datastore::FactStore;
use cf_analytics_exporter::error::{FetchError, StoreError};
use cf_analytics_exporter::models::{AggregateResponse, Checkpoint, FactDocument};
use cf_analytics_exporter::window::TimeWindow;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Value, json};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub const ZONE_A: &str = "00000000000000000000000000000000";
pub const ZONE_B: &str = "11111111111111111111111111111111";

pub fn utc(s: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .unwrap()
        .and_utc()
}

pub fn zone_names() -> BTreeMap<String, String> {
    BTreeMap::from([
        (ZONE_A.to_string(), "domain.tld".to_string()),
        (ZONE_B.to_string(), "example.tld".to_string()),
    ])
}

/// Wrap zone objects into a `data` payload.
pub fn response_from(zones: Value) -> AggregateResponse {
    serde_json::from_value(json!({ "viewer": { "zones": zones } })).unwrap()
}

/// One zone with one bucket whose `sum` is `sum`.
pub fn single_bucket(zone: &str, datetime: &str, sum: Value, uniques: u64) -> AggregateResponse {
    response_from(json!([{
        "zoneTag": zone,
        "httpRequests1mGroups": [{
            "dimensions": { "datetime": datetime },
            "uniq": { "uniques": uniques },
            "sum": sum,
        }]
    }]))
}

pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Returns scripted results in order; once exhausted, returns an empty zone list.
#[derive(Default)]
pub struct ScriptedSource {
    results: Mutex<VecDeque<Result<AggregateResponse, FetchError>>>,
    pub windows: Mutex<Vec<TimeWindow>>,
    pub zone_ids: Mutex<Vec<Vec<String>>>,
}

impl ScriptedSource {
    pub fn new(results: Vec<Result<AggregateResponse, FetchError>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.windows.lock().unwrap().len()
    }
}

#[async_trait]
impl AnalyticsSource for ScriptedSource {
    async fn fetch(
        &self,
        window: &TimeWindow,
        zone_ids: &[String],
    ) -> Result<AggregateResponse, FetchError> {
        self.windows.lock().unwrap().push(*window);
        self.zone_ids.lock().unwrap().push(zone_ids.to_vec());
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(response_from(json!([]))))
    }
}

/// In-memory store; optionally fails writes or checkpoint lookups.
#[derive(Default)]
pub struct MemoryStore {
    pub docs: Mutex<Vec<FactDocument>>,
    pub batches: AtomicUsize,
    pub schema_calls: AtomicUsize,
    pub latest: Mutex<Option<DateTime<Utc>>>,
    pub fail_writes: bool,
    pub fail_checkpoint: bool,
}

impl MemoryStore {
    pub fn with_latest(latest: DateTime<Utc>) -> Self {
        Self {
            latest: Mutex::new(Some(latest)),
            ..Default::default()
        }
    }

    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Default::default()
        }
    }

    pub fn doc_count(&self) -> usize {
        self.docs.lock().unwrap().len()
    }
}

#[async_trait]
impl FactStore for MemoryStore {
    async fn ensure_schema_ready(&self) -> Result<(), StoreError> {
        self.schema_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn find_latest_checkpoint(&self) -> Result<Option<Checkpoint>, StoreError> {
        if self.fail_checkpoint {
            return Err(StoreError::Schema("checkpoint lookup failed".into()));
        }
        Ok(self.latest.lock().unwrap().map(Checkpoint::new))
    }

    async fn bulk_write(&self, docs: &[FactDocument]) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Schema("write rejected".into()));
        }
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.docs.lock().unwrap().extend_from_slice(docs);
        Ok(())
    }
}

/// Answers from a script; repeats the last answer once exhausted.
pub struct ScriptedAdmission {
    answers: Mutex<VecDeque<bool>>,
    last: Mutex<bool>,
    pub calls: AtomicUsize,
}

impl ScriptedAdmission {
    pub fn new(answers: &[bool]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            last: Mutex::new(answers.last().copied().unwrap_or(false)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdmissionCheck for ScriptedAdmission {
    async fn is_active(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.answers.lock().unwrap().pop_front() {
            Some(answer) => answer,
            None => *self.last.lock().unwrap(),
        }
    }
}

/// Local HTTP/1.1 server answering each request with the next scripted `(status, body)`.
/// Records the request head (request line + headers) of every request it receives.
pub struct StubServer {
    pub url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    pub async fn start(responses: Vec<(u16, &'static str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();
        tokio::spawn(async move {
            let mut responses = VecDeque::from(responses);
            while let Ok((mut socket, _)) = listener.accept().await {
                let head = read_request_head(&mut socket).await;
                seen.lock().unwrap().push(head);
                let (status, body) = responses.pop_front().unwrap_or((500, "no scripted response"));
                let reply = format!(
                    "HTTP/1.1 {status} Scripted\r\ncontent-type: text/plain\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        Self {
            url: format!("http://{addr}/"),
            requests,
        }
    }

    pub fn hits(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Request heads, lowercased.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.to_ascii_lowercase())
            .collect()
    }
}

async fn read_request_head(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).into_owned();
            if buf.len() >= end + 4 + content_length(&head) {
                return head;
            }
        }
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return String::from_utf8_lossy(&buf).into_owned();
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}
