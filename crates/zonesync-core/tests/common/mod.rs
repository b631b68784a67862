//! Test doubles and common utilities for engine contract tests
//!
//! The mocks are cheap to clone; clones share their counters, so a test can
//! hand one copy to the engine and keep another for assertions.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use zonesync_core::config::{ClouDnsAuth, SourceConfig, SyncConfig, TargetConfig};
use zonesync_core::error::{Error, Result};
use zonesync_core::record::{CanonicalRecord, ProviderRef, SourceRecord, TargetRecord};
use zonesync_core::traits::{Metric, MetricsSink, Notifier, SyncNotification, ZoneSource, ZoneTarget};

pub const ZONE: &str = "example.com";

/// Primary zone double
#[derive(Clone, Default)]
pub struct MockSource {
    records: Vec<SourceRecord>,
    fetch_calls: Arc<AtomicUsize>,
    /// When set, fetch_all waits for a permit before answering
    gate: Option<Arc<Notify>>,
    /// When set, fetch_all fails with this HTTP status
    fail_status: Option<u16>,
}

impl MockSource {
    pub fn new(records: Vec<SourceRecord>) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn failing(mut self, status: u16) -> Self {
        self.fail_status = Some(status);
        self
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ZoneSource for MockSource {
    async fn fetch_all(&self) -> Result<Vec<SourceRecord>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match self.fail_status {
            Some(status) => Err(Error::from_status("mock-source", status, "listing failed")),
            None => Ok(self.records.clone()),
        }
    }

    fn provider_name(&self) -> &'static str {
        "mock-source"
    }
}

/// Secondary zone double recording every mutation as `"<kind> <key>"`.
///
/// Keys are the record identity for adds (`"add A www.example.com"`) and the
/// provider id for updates and deletes (`"delete 7"`).
#[derive(Clone, Default)]
pub struct MockTarget {
    records: Vec<TargetRecord>,
    fetch_calls: Arc<AtomicUsize>,
    mutation_calls: Arc<AtomicUsize>,
    applied: Arc<Mutex<Vec<String>>>,
    /// Content sent with each successful update
    updated_contents: Arc<Mutex<Vec<String>>>,
    /// Statuses to fail with, consumed per call, keyed like `applied`
    failures: Arc<Mutex<HashMap<String, VecDeque<u16>>>>,
    /// How long each mutation stays in flight
    mutation_delay: Option<Duration>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl MockTarget {
    pub fn new(records: Vec<TargetRecord>) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    /// Fail the next `statuses.len()` calls for `key`, in order
    pub fn fail_with(self, key: &str, statuses: &[u16]) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(key.to_string(), statuses.iter().copied().collect());
        self
    }

    /// Hold every mutation open for `delay` so overlapping calls are observable
    pub fn with_mutation_delay(mut self, delay: Duration) -> Self {
        self.mutation_delay = Some(delay);
        self
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Highest number of mutations running at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Mutation attempts, including failed ones
    pub fn mutation_calls(&self) -> usize {
        self.mutation_calls.load(Ordering::SeqCst)
    }

    /// Successful mutations, in call order
    pub fn applied(&self) -> Vec<String> {
        self.applied.lock().unwrap().clone()
    }

    pub fn updated_contents(&self) -> Vec<String> {
        self.updated_contents.lock().unwrap().clone()
    }

    async fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.mutation_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn mutate(&self, key: String) -> Result<()> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .failures
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(|queue| queue.pop_front());
        if let Some(status) = injected {
            return Err(Error::from_status("mock-target", status, format!("{key} failed")));
        }
        self.applied.lock().unwrap().push(key);
        Ok(())
    }
}

#[async_trait]
impl ZoneTarget for MockTarget {
    async fn fetch_all(&self) -> Result<Vec<TargetRecord>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.clone())
    }

    async fn add(&self, record: &CanonicalRecord) -> Result<ProviderRef> {
        self.enter().await;
        self.mutate(format!("add {}", record.identity()))?;
        Ok(ProviderRef::new(format!("new-{}", self.mutation_calls())))
    }

    async fn update(&self, target: &ProviderRef, record: &CanonicalRecord) -> Result<()> {
        self.enter().await;
        self.mutate(format!("update {}", target.id))?;
        self.updated_contents.lock().unwrap().push(record.content().to_string());
        Ok(())
    }

    async fn delete(&self, target: &ProviderRef) -> Result<()> {
        self.enter().await;
        self.mutate(format!("delete {}", target.id))
    }

    fn zone_name(&self) -> &str {
        ZONE
    }

    fn provider_name(&self) -> &'static str {
        "mock-target"
    }
}

/// Keeps every notification it receives
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<SyncNotification>>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<SyncNotification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &SyncNotification) -> Result<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Rejects every notification
#[derive(Clone, Default)]
pub struct FailingNotifier {
    attempts: Arc<AtomicUsize>,
}

impl FailingNotifier {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _notification: &SyncNotification) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(Error::notification("webhook returned 500"))
    }
}

/// Keeps every metric it receives
#[derive(Clone, Default)]
pub struct RecordingMetrics {
    recorded: Arc<Mutex<Vec<Metric>>>,
}

impl RecordingMetrics {
    pub fn recorded(&self) -> Vec<Metric> {
        self.recorded.lock().unwrap().clone()
    }

    pub fn named(&self, name: &str) -> Option<Metric> {
        self.recorded().into_iter().find(|m| m.name == name)
    }
}

#[async_trait]
impl MetricsSink for RecordingMetrics {
    async fn record(&self, metric: Metric) -> Result<()> {
        self.recorded.lock().unwrap().push(metric);
        Ok(())
    }
}

/// Helper to create a minimal SyncConfig for testing
pub fn minimal_config() -> SyncConfig {
    let mut config = SyncConfig::new(
        SourceConfig::Cloudflare {
            api_token: "test-token".to_string(),
            zone_id: "test-zone".to_string(),
        },
        TargetConfig::Cloudns {
            auth: ClouDnsAuth::AuthId("1234".to_string()),
            auth_password: "test-password".to_string(),
            domain_name: ZONE.to_string(),
        },
    );
    config.engine.retry_base_delay_ms = 10;
    config.engine.retry_max_delay_ms = 100;
    config
}

/// Cloudflare-shaped record
pub fn cf(id: &str, record_type: &str, name: &str, content: &str, ttl: u32) -> SourceRecord {
    SourceRecord {
        id: id.to_string(),
        record_type: record_type.to_string(),
        name: name.to_string(),
        content: content.to_string(),
        ttl,
        priority: None,
        data: None,
        modified_on: None,
    }
}

/// ClouDNS-shaped record
pub fn cns(id: &str, record_type: &str, host: &str, record: &str, ttl: u32) -> TargetRecord {
    TargetRecord {
        id: id.to_string(),
        record_type: record_type.to_string(),
        host: host.to_string(),
        record: record.to_string(),
        ttl,
        ..Default::default()
    }
}

/// Let spawned tasks run until `done` holds
pub async fn wait_until(mut done: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if done() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
