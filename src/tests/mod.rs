use std::{collections::VecDeque, sync::Mutex};

use serde_json::json;
use url::Url;

use crate::{
    progress::{EntryStatus, ProgressReporter, SyncPhase, SyncProgress},
    remote::{RemoteRecord, Transport},
};


#[derive(Debug, thiserror::Error)]
#[error("stub: {0}")]
pub struct StubError(String);

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Get { url: Url, bearer: String },
    Post { url: Url, body: serde_json::Value },
}

/// Transport answering GETs from a queue. POSTs succeed unless a failure was queued.
#[derive(Default)]
pub struct StubTransport {
    gets: Mutex<VecDeque<Result<serde_json::Value, String>>>,
    posts: Mutex<VecDeque<Result<(), String>>>,
    requests: Mutex<Vec<Request>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_pages(pages: impl IntoIterator<Item = serde_json::Value>) -> Self {
        let stub = Self::new();
        for page in pages {
            stub.push_get(Ok(page));
        }
        stub
    }

    pub fn push_get(&self, response: Result<serde_json::Value, String>) {
        self.gets.lock().unwrap().push_back(response);
    }

    pub fn push_post(&self, response: Result<(), String>) {
        self.posts.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn get_urls(&self) -> Vec<Url> {
        self.requests()
            .into_iter()
            .filter_map(|request| match request {
                Request::Get { url, .. } => Some(url),
                Request::Post { .. } => None,
            })
            .collect()
    }
}

impl Transport for StubTransport {
    type Error = StubError;

    async fn get_json(&self, url: &Url, bearer: &str) -> Result<serde_json::Value, Self::Error> {
        self.requests.lock().unwrap().push(Request::Get {
            url: url.clone(),
            bearer: bearer.to_owned(),
        });
        let response = self.gets.lock().unwrap().pop_front();
        response
            .unwrap_or_else(|| Err("no response queued".into()))
            .map_err(StubError)
    }

    async fn post_json(&self, url: &Url, body: &serde_json::Value) -> Result<(), Self::Error> {
        self.requests.lock().unwrap().push(Request::Post {
            url: url.clone(),
            body: body.clone(),
        });
        let response = self.posts.lock().unwrap().pop_front();
        response.unwrap_or(Ok(())).map_err(StubError)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Phase(SyncPhase),
    Fetched(usize),
    Registered(usize),
    Entry(String, EntryStatus),
    Chunk(SyncProgress),
    Info(String),
    Warn(String),
    Error(String),
    Finish,
}

#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<Event>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn chunks(&self) -> Vec<SyncProgress> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Chunk(progress) => Some(progress),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Error(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl ProgressReporter for RecordingReporter {
    fn set_phase(&self, phase: SyncPhase) {
        self.push(Event::Phase(phase));
    }

    fn records_fetched(&self, total: usize) {
        self.push(Event::Fetched(total));
    }

    fn register_notes(&self, total: usize) {
        self.push(Event::Registered(total));
    }

    fn update_entry(&self, path: &str, status: EntryStatus) {
        self.push(Event::Entry(path.to_owned(), status));
    }

    fn chunk_finished(&self, progress: SyncProgress) {
        self.push(Event::Chunk(progress));
    }

    fn log_info(&self, message: &str) {
        self.push(Event::Info(message.to_owned()));
    }

    fn log_warn(&self, message: &str) {
        self.push(Event::Warn(message.to_owned()));
    }

    fn log_error(&self, message: &str) {
        self.push(Event::Error(message.to_owned()));
    }

    fn finish(&self) {
        self.push(Event::Finish);
    }
}

/// A record in the zh-cn column layout.
pub fn note_record(title: &str, content: &str) -> RemoteRecord {
    serde_json::from_value(json!({
        "id": format!("rec{title}"),
        "fields": { "Title": title, "MD": content }
    }))
    .unwrap()
}

pub fn page(records: &[RemoteRecord], offset: Option<&str>) -> serde_json::Value {
    let records = records
        .iter()
        .map(|record| json!({ "id": record.id, "fields": record.fields }))
        .collect::<Vec<_>>();
    match offset {
        Some(offset) => json!({ "records": records, "offset": offset }),
        None => json!({ "records": records }),
    }
}

pub fn api_root() -> Url {
    Url::parse("https://api.example.test/v0/").unwrap()
}
