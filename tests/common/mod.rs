#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use ndex_mirror::app::{ProgressEvent, ProgressSink};
use ndex_mirror::domain::{NetworkDescriptor, NetworkId};
use ndex_mirror::error::MirrorError;
use ndex_mirror::ndex::{CatalogClient, ContentFetcher, NetworkSearchResponse, NetworkSummary};
use ndex_mirror::sink::ObjectSink;

pub fn descriptor(id: &str, name: &str, node_count: u64, edge_count: u64) -> NetworkDescriptor {
    NetworkDescriptor {
        id: id.parse().unwrap(),
        name: name.to_string(),
        node_count,
        edge_count,
    }
}

pub fn descriptors(count: usize) -> Vec<NetworkDescriptor> {
    (0..count)
        .map(|i| descriptor(&format!("net{i}"), &format!("Network {i}"), i as u64, 2 * i as u64))
        .collect()
}

pub fn content_for(id: &str) -> Vec<u8> {
    format!("{{\"network\":\"{id}\"}}").into_bytes()
}

/// Counts units currently between fetch and the end of their upload.
#[derive(Default)]
pub struct InFlight {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct MockFetcher {
    pub calls: Mutex<Vec<String>>,
    pub failing: Vec<String>,
    pub in_flight: Option<Arc<InFlight>>,
    /// When set, each fetch waits (up to a deadline) until this many fetches
    /// are in flight at once.
    pub rendezvous: Option<usize>,
    pub delay: Option<Duration>,
}

impl MockFetcher {
    pub fn failing_on(ids: &[&str]) -> Self {
        Self {
            failing: ids.iter().map(|id| id.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl ContentFetcher for MockFetcher {
    fn fetch(&self, id: &NetworkId) -> Result<Box<dyn Read + Send>, MirrorError> {
        self.calls.lock().unwrap().push(id.as_str().to_string());
        if let Some(in_flight) = &self.in_flight {
            in_flight.enter();
        }
        if let (Some(expected), Some(in_flight)) = (self.rendezvous, &self.in_flight) {
            let deadline = Instant::now() + Duration::from_secs(10);
            while in_flight.max() < expected && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(2));
            }
        }
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        if self.failing.iter().any(|failing| failing == id.as_str()) {
            if let Some(in_flight) = &self.in_flight {
                in_flight.leave();
            }
            return Err(MirrorError::NdexStatus {
                status: 500,
                message: format!("cannot fetch {id}"),
            });
        }
        Ok(Box::new(Cursor::new(content_for(id.as_str()))))
    }
}

#[derive(Default)]
pub struct MockSink {
    pub objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    pub puts: AtomicUsize,
    pub in_flight: Option<Arc<InFlight>>,
}

impl MockSink {
    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

impl ObjectSink for MockSink {
    fn put(&self, bucket: &str, key: &str, body: &mut dyn Read) -> Result<u64, MirrorError> {
        let mut content = Vec::new();
        body.read_to_end(&mut content)
            .map_err(|err| MirrorError::S3Upload {
                key: key.to_string(),
                message: err.to_string(),
            })?;
        let size = content.len() as u64;
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), content);
        self.puts.fetch_add(1, Ordering::SeqCst);
        if let Some(in_flight) = &self.in_flight {
            in_flight.leave();
        }
        Ok(size)
    }
}

pub struct MockCatalog {
    pub response: NetworkSearchResponse,
    pub calls: AtomicUsize,
}

impl MockCatalog {
    pub fn new(num_found: u64, networks: &[(&str, Option<&str>, u64, u64)]) -> Self {
        let networks = networks
            .iter()
            .map(|(id, name, node_count, edge_count)| NetworkSummary {
                name: name.map(str::to_string),
                external_id: id.to_string(),
                node_count: *node_count,
                edge_count: *edge_count,
            })
            .collect();
        Self {
            response: NetworkSearchResponse {
                num_found,
                networks,
            },
            calls: AtomicUsize::new(0),
        }
    }
}

impl CatalogClient for MockCatalog {
    fn search_networks(&self) -> Result<NetworkSearchResponse, MirrorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

#[derive(Default)]
pub struct RecordingProgress {
    pub messages: Mutex<Vec<String>>,
}

impl RecordingProgress {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingProgress {
    fn event(&self, event: ProgressEvent) {
        self.messages.lock().unwrap().push(event.message);
    }
}
