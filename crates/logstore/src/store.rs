// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Log Store: ring-buffered, per-process-indexed log ingestion with an
//! asynchronous worker and a synchronous backpressure fallback, URL
//! extraction, and error-context accumulation (spec.md §4.3).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use brummer_core::{
    Config, ErrorContext, LogEntry, LogEntryId, LogLevel, ProcessId, UrlRecord,
};
use brummer_errorparser::ErrorParser;
use brummer_eventbus::EventBus;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::url_extract;

const URL_CAP: usize = 100;

/// One ingest job queued for the background worker; falls back to
/// synchronous insertion when the channel is saturated (spec.md: "no entry
/// is silently dropped").
struct IngestJob {
    id: LogEntryId,
    process_id: ProcessId,
    process_name: String,
    content: String,
    is_error: bool,
    timestamp: SystemTime,
}

struct State {
    entries: VecDeque<LogEntry>,
    by_process: HashMap<ProcessId, VecDeque<LogEntryId>>,
    urls: indexmap::IndexMap<String, UrlRecord>,
    error_contexts: VecDeque<ErrorContext>,
    dropped_error_contexts: u64,
}

impl State {
    fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            by_process: HashMap::new(),
            urls: indexmap::IndexMap::new(),
            error_contexts: VecDeque::new(),
            dropped_error_contexts: 0,
        }
    }
}

struct Shared {
    config: Config,
    event_bus: EventBus,
    state: Mutex<State>,
    parser: Mutex<ErrorParser>,
    next_id: AtomicU64,
    ingest_tx: mpsc::Sender<IngestJob>,
}

/// Ring-buffered, async-ingesting log store. Cheap to clone — shares one
/// inner state behind an `Arc`.
#[derive(Clone)]
pub struct LogStore {
    shared: Arc<Shared>,
}

pub struct LogStoreHandle {
    worker: tokio::task::JoinHandle<()>,
}

impl LogStoreHandle {
    pub async fn shutdown(self) {
        // Dropping the sender (done by `LogStore` going out of scope in the
        // caller) closes the channel; here we just wait for the worker to
        // observe that and exit.
        let _ = self.worker.await;
    }
}

impl LogStore {
    /// Construct a store and spawn its single ingest worker. The worker
    /// classifies and parses outside the lock, then takes it only for the
    /// O(1) insertion + index update (spec.md §5 lock-ordering rule).
    pub fn new(config: Config, event_bus: EventBus) -> (Self, LogStoreHandle) {
        let parser = match ErrorParser::from_config(&config) {
            Ok(parser) => parser,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = ?config.error_patterns_path,
                    "failed to load configured error patterns, falling back to the built-in table"
                );
                ErrorParser::new(&config)
            }
        };
        let (ingest_tx, mut ingest_rx) = mpsc::channel(1000);
        let shared = Arc::new(Shared {
            config,
            event_bus,
            state: Mutex::new(State::new()),
            parser: Mutex::new(parser),
            next_id: AtomicU64::new(1),
            ingest_tx,
        });

        let worker_shared = shared.clone();
        let worker = tokio::spawn(async move {
            while let Some(job) = ingest_rx.recv().await {
                ingest(&worker_shared, job);
            }
        });

        (Self { shared }, LogStoreHandle { worker })
    }

    /// Fire-and-forget ingest. Returns the synthesized entry id immediately;
    /// the entry itself lands asynchronously unless the channel is
    /// saturated, in which case it is inserted synchronously before this
    /// call returns (spec.md: "no entry silently dropped").
    pub fn add(
        &self,
        process_id: ProcessId,
        process_name: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> LogEntryId {
        let id = LogEntryId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let job = IngestJob {
            id,
            process_id,
            process_name: process_name.into(),
            content: content.into(),
            is_error,
            timestamp: SystemTime::now(),
        };
        match self.shared.ingest_tx.try_send(job) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(job)) | Err(mpsc::error::TrySendError::Closed(job)) => {
                ingest(&self.shared, job);
                return id;
            }
        }
        id
    }

    pub fn get_all(&self) -> Vec<LogEntry> {
        self.shared.state.lock().entries.iter().cloned().collect()
    }

    pub fn get_by_process(&self, process_id: ProcessId) -> Vec<LogEntry> {
        let state = self.shared.state.lock();
        state.entries.iter().filter(|e| e.process_id == process_id).cloned().collect()
    }

    pub fn search(&self, substring: &str) -> Vec<LogEntry> {
        let needle = substring.to_ascii_lowercase();
        self.shared
            .state
            .lock()
            .entries
            .iter()
            .filter(|e| e.content.to_ascii_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    pub fn get_high_priority(&self, threshold: i32) -> Vec<LogEntry> {
        self.shared.state.lock().entries.iter().filter(|e| e.priority >= threshold).cloned().collect()
    }

    pub fn get_errors(&self) -> Vec<LogEntry> {
        self.shared.state.lock().entries.iter().filter(|e| e.is_error).cloned().collect()
    }

    pub fn get_error_contexts(&self) -> Vec<ErrorContext> {
        self.shared.state.lock().error_contexts.iter().cloned().collect()
    }

    pub fn get_urls(&self) -> Vec<UrlRecord> {
        self.shared.state.lock().urls.values().cloned().collect()
    }

    pub fn clear_logs(&self) {
        let mut state = self.shared.state.lock();
        state.entries.clear();
        state.by_process.clear();
    }

    pub fn clear_logs_for_process(&self, process_name: &str) {
        let mut state = self.shared.state.lock();
        state.entries.retain(|e| e.process_name != process_name);
        state.by_process = rebuild_index(&state.entries);
    }

    /// Force-finalize any open error-parser state (pattern contexts and time
    /// clusters) belonging to a single process. Called when that process
    /// exits, so a cluster still accumulating at exit time isn't silently
    /// lost (spec.md §4.4, §8 "open error context force-finalized").
    pub fn flush_process(&self, process_id: ProcessId) {
        let flushed = self.shared.parser.lock().flush_process(process_id);
        self.finalize_and_publish(flushed);
    }

    /// Force-finalize any open error-parser state (pattern contexts and time
    /// clusters) for every process. Called at shutdown so nothing in flight
    /// is silently lost (spec.md §4.4, §8 "open error context force-finalized").
    pub fn flush_parser(&self) {
        let flushed = self.shared.parser.lock().flush_all();
        self.finalize_and_publish(flushed);
    }

    fn finalize_and_publish(&self, flushed: Vec<ErrorContext>) {
        if flushed.is_empty() {
            return;
        }
        let finalized: Vec<ErrorContext> = {
            let mut state = self.shared.state.lock();
            flushed.into_iter().map(|ctx| push_error_context(&mut state, ctx, self.shared.config.max_error_contexts)).collect()
        };
        for context in finalized {
            self.shared.event_bus.publish(brummer_core::Event::ErrorDetected { context });
        }
    }

    /// Fold runs of consecutive identical entries (by process + content)
    /// into a single collapsed record carrying a count and first/last
    /// timestamps (spec.md §8 collapsing law).
    pub fn get_collapsed(&self) -> Vec<brummer_core::CollapsedLogEntry> {
        let entries = self.get_all();
        let mut out: Vec<brummer_core::CollapsedLogEntry> = Vec::new();
        for entry in entries {
            if let Some(last) = out.last_mut() {
                if last.process_id == entry.process_id && last.content == entry.content {
                    last.count += 1;
                    last.last_seen = entry.timestamp;
                    continue;
                }
            }
            out.push(brummer_core::CollapsedLogEntry {
                process_id: entry.process_id,
                process_name: entry.process_name,
                content: entry.content,
                level: entry.level,
                count: 1,
                first_seen: entry.timestamp,
                last_seen: entry.timestamp,
            });
        }
        out
    }

    pub fn dropped_error_contexts(&self) -> u64 {
        self.shared.state.lock().dropped_error_contexts
    }
}

fn rebuild_index(entries: &VecDeque<LogEntry>) -> HashMap<ProcessId, VecDeque<LogEntryId>> {
    let mut index: HashMap<ProcessId, VecDeque<LogEntryId>> = HashMap::new();
    for entry in entries {
        index.entry(entry.process_id).or_default().push_back(entry.id);
    }
    index
}

/// Classify and parse outside the lock, then take it only for insertion and
/// index/ring-buffer maintenance (spec.md §5: "writers hold the write lock
/// only for O(1) index work"). Uses the id `add` already minted and handed
/// back to its caller, so the id returned from `add` always matches the
/// entry that actually lands in the ring buffer.
fn ingest(shared: &Arc<Shared>, job: IngestJob) {
    let IngestJob { id, process_id, process_name, content, is_error, timestamp } = job;

    let level = LogLevel::classify(&content, is_error);
    let tags = LogEntry::extract_tags(&content);
    let priority = LogEntry::score_priority(&content, is_error, &tags);
    let urls = url_extract::detect(&content);
    let error_contexts =
        shared.parser.lock().process_line(process_id, &process_name, &content, is_error, timestamp);

    let entry = LogEntry {
        id,
        process_id,
        process_name: process_name.clone(),
        timestamp,
        content: content.clone(),
        is_error,
        level,
        tags,
        priority,
    };

    let max_entries = shared.config.log_ring_capacity;
    let max_contexts = shared.config.max_error_contexts;

    let mut new_urls = Vec::new();
    let mut finalized_contexts = Vec::new();

    {
        let mut state = shared.state.lock();

        state.entries.push_back(entry.clone());
        state.by_process.entry(process_id).or_default().push_back(id);
        while state.entries.len() > max_entries {
            if let Some(evicted) = state.entries.pop_front() {
                if let Some(idx) = state.by_process.get_mut(&evicted.process_id) {
                    idx.pop_front();
                }
            }
        }

        for url in urls {
            if let Some(record) = observe_url(&mut state, url, process_id, &process_name, &content, timestamp) {
                new_urls.push(record);
            }
        }

        for ctx in error_contexts {
            finalized_contexts.push(push_error_context(&mut state, ctx, max_contexts));
        }
    }

    shared.event_bus.publish(brummer_core::Event::LogLine {
        process_id,
        process_name,
        content,
        is_error,
        level,
        timestamp: Some(timestamp),
    });

    for record in new_urls {
        shared.event_bus.publish(brummer_core::Event::UrlDetected { record });
    }
    for context in finalized_contexts {
        shared.event_bus.publish(brummer_core::Event::ErrorDetected { context });
    }
}

/// Record a sighting of `url`. Returns the freshly-created record when this
/// is the URL's first sighting — re-observations update `latest_seen`/
/// `context` in place and are not re-announced on the event bus.
fn observe_url(
    state: &mut State,
    url: String,
    process_id: ProcessId,
    process_name: &str,
    context_line: &str,
    timestamp: SystemTime,
) -> Option<UrlRecord> {
    if let Some(existing) = state.urls.get_mut(&url) {
        existing.observe(timestamp, context_line);
        return None;
    }
    let record = UrlRecord {
        url: url.clone(),
        process_id,
        process_name: process_name.to_string(),
        first_seen: timestamp,
        latest_seen: timestamp,
        context: context_line.to_string(),
        proxy_url: None,
    };
    state.urls.insert(url, record.clone());
    while state.urls.len() > URL_CAP {
        state.urls.shift_remove_index(0);
    }
    Some(record)
}

fn push_error_context(state: &mut State, ctx: ErrorContext, max_contexts: usize) -> ErrorContext {
    state.error_contexts.push_back(ctx.clone());
    while state.error_contexts.len() > max_contexts {
        state.error_contexts.pop_front();
        state.dropped_error_contexts += 1;
    }
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;
    use brummer_eventbus::EventBusConfig;
    use std::time::Duration;

    fn config(ring: usize) -> Config {
        Config {
            working_dir: std::env::temp_dir(),
            bind_host: "127.0.0.1".into(),
            port: 0,
            log_ring_capacity: ring,
            max_line_bytes: 16 * 1024,
            session_idle_timeout_secs: 300,
            error_cluster_gap_ms: 200,
            error_cluster_max_lines: 50,
            error_cluster_max_duration_ms: 5_000,
            error_cluster_min_lines: 2,
            error_pattern_max_lines: 200,
            max_error_contexts: 1_000,
            heartbeat_interval_secs: 5,
            heartbeat_ttl_secs: 10,
            error_patterns_path: None,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn add_is_visible_after_a_brief_settle() {
        let (bus, _handle) = EventBus::new(EventBusConfig { queue_capacity: 64, worker_count: 2 });
        let (store, _h) = LogStore::new(config(100), bus);
        let p = ProcessId::new();
        store.add(p, "dev", "hello world", false);
        settle().await;
        assert_eq!(store.get_all().len(), 1);
    }

    /// The id `add` hands back to its caller must be the id the entry is
    /// actually stored under, on the common (non-full-channel) path.
    #[tokio::test]
    async fn add_returns_the_id_the_entry_is_actually_stored_under() {
        let (bus, _handle) = EventBus::new(EventBusConfig { queue_capacity: 64, worker_count: 2 });
        let (store, _h) = LogStore::new(config(100), bus);
        let p = ProcessId::new();
        let returned_id = store.add(p, "dev", "hello world", false);
        settle().await;
        let stored = store.get_all();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, returned_id);
    }

    #[tokio::test]
    async fn ring_buffer_evicts_oldest_and_keeps_index_consistent() {
        let (bus, _handle) = EventBus::new(EventBusConfig { queue_capacity: 64, worker_count: 2 });
        let (store, _h) = LogStore::new(config(5), bus);
        let p = ProcessId::new();
        for i in 0..10 {
            store.add(p, "dev", format!("line {i}"), false);
        }
        settle().await;
        let all = store.get_all();
        assert_eq!(all.len(), 5);
        assert_eq!(all.first().unwrap().content, "line 5");
        assert_eq!(all.last().unwrap().content, "line 9");
        let by_process = store.get_by_process(p);
        assert_eq!(by_process.len(), 5);
    }

    #[tokio::test]
    async fn burst_of_10000_adds_respects_ring_not_channel_capacity() {
        let (bus, _handle) = EventBus::new(EventBusConfig { queue_capacity: 64, worker_count: 2 });
        let (store, _h) = LogStore::new(config(10_000), bus);
        let p = ProcessId::new();
        for i in 0..10_000 {
            store.add(p, "dev", format!("line {i}"), false);
        }
        settle().await;
        let all = store.get_all();
        assert_eq!(all.len(), 10_000);
        let mut ids: Vec<u64> = all.iter().map(|e| e.id.0).collect();
        ids.dedup();
        assert_eq!(ids.len(), all.len(), "no entry id collisions");
        for pair in all.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[tokio::test]
    async fn url_detection_deduplicates_and_updates_timestamp() {
        let (bus, _handle) = EventBus::new(EventBusConfig { queue_capacity: 64, worker_count: 2 });
        let (store, _h) = LogStore::new(config(100), bus);
        let p = ProcessId::new();
        store.add(p, "dev", "\x1b[32mServer running at http://localhost:3000\x1b[0m.", false);
        settle().await;
        let first = store.get_urls();
        assert_eq!(first.len(), 1);
        let first_seen = first[0].first_seen;

        tokio::time::sleep(Duration::from_millis(10)).await;
        store.add(p, "dev", "Server running at http://localhost:3000 again.", false);
        settle().await;

        let second = store.get_urls();
        assert_eq!(second.len(), 1, "duplicate URL must not create a second record");
        assert_eq!(second[0].first_seen, first_seen);
        assert!(second[0].latest_seen >= first_seen);
    }

    #[tokio::test]
    async fn mongo_error_scenario_produces_one_error_context() {
        let (bus, _handle) = EventBus::new(EventBusConfig { queue_capacity: 64, worker_count: 2 });
        let (store, _h) = LogStore::new(config(100), bus);
        let p = ProcessId::new();
        for line in [
            "MongoError: getaddrinfo ENOTFOUND mongodb.localhost",
            "  errorLabelSet: Set(0) {},",
            "  hostname: 'mongodb.localhost'",
            "}",
        ] {
            store.add(p, "api", line, false);
        }
        settle().await;
        store.add(p, "api", "Attempting reconnect...", false);
        settle().await;

        let contexts = store.get_error_contexts();
        let mongo = contexts.iter().find(|c| c.error_type == "MongoError");
        assert!(mongo.is_some(), "expected a MongoError context, got {contexts:?}");
        assert!(mongo.unwrap().message.contains("(hostname: mongodb.localhost)"));
    }

    /// A process-exit flush force-finalizes a pattern context that never
    /// saw its closing line (spec.md §4.4/§8: "open error context
    /// force-finalized"); this is the path `Supervisor` drives when a
    /// supervised process exits (see crates/supervisor/src/supervisor.rs).
    #[tokio::test]
    async fn flush_process_finalizes_a_still_open_context() {
        let (bus, _handle) = EventBus::new(EventBusConfig { queue_capacity: 64, worker_count: 2 });
        let (store, _h) = LogStore::new(config(100), bus);
        let p = ProcessId::new();
        store.add(p, "api", "MongoError: getaddrinfo ENOTFOUND mongodb.localhost", false);
        store.add(p, "api", "  hostname: 'mongodb.localhost'", false);
        settle().await;
        assert!(store.get_error_contexts().is_empty(), "context should still be open pre-flush");

        store.flush_process(p);
        let contexts = store.get_error_contexts();
        assert!(contexts.iter().any(|c| c.error_type == "MongoError"), "{contexts:?}");
    }

    #[tokio::test]
    async fn collapsing_folds_consecutive_identical_runs() {
        let (bus, _handle) = EventBus::new(EventBusConfig { queue_capacity: 64, worker_count: 2 });
        let (store, _h) = LogStore::new(config(100), bus);
        let p = ProcessId::new();
        for content in ["a", "a", "a", "b", "a", "a"] {
            store.add(p, "dev", content, false);
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        settle().await;

        let collapsed = store.get_collapsed();
        let counts: Vec<(String, usize)> = collapsed.iter().map(|c| (c.content.clone(), c.count)).collect();
        assert_eq!(
            counts,
            vec![("a".to_string(), 3), ("b".to_string(), 1), ("a".to_string(), 2)]
        );
        assert!(collapsed[0].first_seen <= collapsed[0].last_seen);
    }

    #[tokio::test]
    async fn clear_logs_for_process_rebuilds_index() {
        let (bus, _handle) = EventBus::new(EventBusConfig { queue_capacity: 64, worker_count: 2 });
        let (store, _h) = LogStore::new(config(100), bus);
        let p1 = ProcessId::new();
        let p2 = ProcessId::new();
        store.add(p1, "dev", "from dev", false);
        store.add(p2, "web", "from web", false);
        settle().await;

        store.clear_logs_for_process("dev");
        let remaining = store.get_all();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].process_name, "web");
        assert_eq!(store.get_by_process(p1).len(), 0);
        assert_eq!(store.get_by_process(p2).len(), 1);
    }

    #[tokio::test]
    async fn search_is_case_insensitive_substring_match() {
        let (bus, _handle) = EventBus::new(EventBusConfig { queue_capacity: 64, worker_count: 2 });
        let (store, _h) = LogStore::new(config(100), bus);
        let p = ProcessId::new();
        store.add(p, "dev", "Compiling module FooBar", false);
        settle().await;
        assert_eq!(store.search("foobar").len(), 1);
        assert_eq!(store.search("nope").len(), 0);
    }
}
