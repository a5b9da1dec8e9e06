//! Shared test fixtures: a scriptable in-memory fetcher and payload
//! builders.

use parking_lot::Mutex;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use propharvest::{FetchError, Fetcher};

/// Scriptable fetcher: per-URL response queues with a fallback for
/// everything unscripted. Clones share the script and counters, so one
/// script can drive a whole worker fleet.
#[derive(Clone)]
pub struct StubFetcher {
    responses: Arc<Mutex<HashMap<String, VecDeque<Result<String, FetchError>>>>>,
    fallback_ok: bool,
    pub fetches: Arc<AtomicUsize>,
    pub rotations: Arc<AtomicUsize>,
}

impl StubFetcher {
    pub fn new(fallback_ok: bool) -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            fallback_ok,
            fetches: Arc::new(AtomicUsize::new(0)),
            rotations: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue one response for a URL; queued entries are consumed in order.
    pub fn script(&self, url: &str, response: Result<String, FetchError>) {
        self.responses
            .lock()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn rotation_count(&self) -> usize {
        self.rotations.load(Ordering::SeqCst)
    }
}

impl Fetcher for StubFetcher {
    async fn open(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn fetch(&mut self, url: &str) -> Result<String, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(queue) = self.responses.lock().get_mut(url) {
            if let Some(response) = queue.pop_front() {
                return response;
            }
        }
        if self.fallback_ok {
            Ok(detail_payload_for(url))
        } else {
            Err(FetchError::Transport("unscripted url".to_string()))
        }
    }

    async fn rotate(&mut self) -> anyhow::Result<()> {
        self.rotations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) {}

    fn proxy_label(&self) -> String {
        "stub-proxy".to_string()
    }

    fn initial_proxy_index(&self) -> Option<usize> {
        None
    }
}

/// A list-page payload with `count` listings whose URLs embed `page_no`.
pub fn list_payload(page_no: u32, count: usize) -> String {
    let listings: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            json!({"listingData": {
                "url": format!("/property-listing/p{page_no}-{i}"),
                "localizedTitle": format!("Listing {page_no}-{i}"),
                "updatedAt": 1_700_000_000,
                "postedAt": 1_690_000_000,
                "adId": format!("{page_no}{i:03}"),
                "agent": {"name": "Agent A", "id": format!("AG{i}")}
            }})
        })
        .collect();
    json!({"props": {"pageProps": {"pageData": {"data": {
        "listingsData": {"listings": listings}
    }}}}})
    .to_string()
}

/// A minimal but valid detail payload for any URL.
pub fn detail_payload_for(url: &str) -> String {
    json!({"props": {"pageProps": {"pageData": {"data": {
        "listingData": {
            "url": url,
            "localizedTitle": "Some Home",
            "priceValue": 750_000
        },
        "propertyOverviewData": {"propertyInfo": {
            "fullAddress": "8 Jalan Contoh, Petaling Jaya, Selangor"
        }}
    }}}}})
    .to_string()
}
