//! The dispatcher: sequences one observed change through stability check,
//! dedup, and the three-sink fan-out.
//!
//! Per-path state machine:
//! `Detected → Classified → (Skipped | Stabilizing → Stable → Deduped? →
//! Pushed{remote, vcs} → (Notifiable? → Resolved → RateLimited → Notified))
//! → Done`.
//!
//! The dispatcher exclusively owns the dedup ledger and the rate limiter —
//! the only mutable shared state in the process — and receives its sinks as
//! injected components. Sink failures are isolated: each (event, sink) pair
//! gets its own outcome, logged independently, and one failing sink never
//! blocks the others.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use swarmlink_core::{
    classify::classify_at, store, Category, ChangeEvent, ChangeKind, Config, DedupKey,
    DispatchOutcome, NotifyConfig, Record,
};
use swarmlink_sync::{
    format_notification, resolve, GitPublisher, HttpStore, Messenger, NotifySink, Publisher,
    PublishSink, RemoteTable, RetryPolicy, TelegramMessenger, UpsertSink,
};

use crate::ledger::DedupLedger;
use crate::limiter::RateLimiter;
use crate::paths::{MIN_NOTIFY_SPACING, STABILITY_POLL_INTERVAL};
use crate::stability::is_stable;

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Per-sink outcome counters, exposed through the status protocol.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SinkCounters {
    pub processed: u64,
    pub skipped: u64,
    pub deduped: u64,
    pub unstable: u64,
    pub malformed: u64,
    pub remote_success: u64,
    pub remote_failure: u64,
    pub vcs_success: u64,
    pub vcs_failure: u64,
    pub notify_success: u64,
    pub notify_failure: u64,
}

pub type SharedCounters = Arc<RwLock<SinkCounters>>;

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// The three push targets, bundled for injection into the dispatcher.
pub struct SinkSet {
    pub upsert: Arc<UpsertSink>,
    pub publish: Arc<PublishSink>,
    pub notify: Arc<NotifySink>,
}

impl SinkSet {
    pub fn new(
        store: Arc<dyn RemoteTable>,
        publisher: Arc<dyn Publisher>,
        messenger: Arc<dyn Messenger>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            upsert: Arc::new(UpsertSink::new(store, policy)),
            publish: Arc::new(PublishSink::new(publisher, policy)),
            notify: Arc::new(NotifySink::new(messenger, policy)),
        }
    }

    /// Production wiring: HTTP store, git publisher rooted at the data
    /// tree, Telegram transport, default retry policy.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(HttpStore::new(&config.store)),
            Arc::new(GitPublisher::new(&config.data_root)),
            Arc::new(TelegramMessenger::new(&config.notify)),
            RetryPolicy::default(),
        )
    }
}

/// Timing knobs, overridable in tests.
#[derive(Debug, Clone, Copy)]
pub struct Tuning {
    pub poll_interval: Duration,
    pub min_notify_spacing: Duration,
    /// When set, replaces the per-category stability timeout.
    pub stability_timeout: Option<Duration>,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            poll_interval: STABILITY_POLL_INTERVAL,
            min_notify_spacing: MIN_NOTIFY_SPACING,
            stability_timeout: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct Dispatcher {
    root: PathBuf,
    notify_config: NotifyConfig,
    sinks: SinkSet,
    tuning: Tuning,
    ledger: DedupLedger,
    limiter: RateLimiter,
    counters: SharedCounters,
}

impl Dispatcher {
    pub fn new(
        root: PathBuf,
        notify_config: NotifyConfig,
        sinks: SinkSet,
        tuning: Tuning,
        counters: SharedCounters,
    ) -> Self {
        Self {
            root,
            notify_config,
            sinks,
            tuning,
            ledger: DedupLedger::default(),
            limiter: RateLimiter::new(tuning.min_notify_spacing),
            counters,
        }
    }

    /// Run one event through the full pipeline. Never returns an error:
    /// every per-event and per-sink failure is caught, counted, and logged
    /// so one bad record cannot halt the loop.
    pub async fn handle_event(&mut self, event: ChangeEvent) {
        let Some(category) = classify_at(&self.root, &event.path) else {
            self.bump(|c| c.skipped += 1).await;
            return;
        };

        if event.kind == ChangeKind::Deleted {
            // Sinks need parseable content; remote deletion is reconciled
            // by the bulk push/pull commands instead.
            tracing::debug!(path = %event.path.display(), "deletion observed, not dispatched");
            self.bump(|c| c.skipped += 1).await;
            return;
        }

        let timeout = self
            .tuning
            .stability_timeout
            .unwrap_or_else(|| category.stability_timeout());
        if !is_stable(&event.path, timeout, self.tuning.poll_interval).await
        {
            tracing::warn!(
                path = %event.path.display(),
                category = %category,
                "file never stabilized, skipping event",
            );
            self.bump(|c| c.unstable += 1).await;
            return;
        }

        let record = match store::read_record(category, &event.path) {
            Ok(record) => record,
            Err(err) => {
                self.handle_malformed(&event, category, &err).await;
                return;
            }
        };

        let key = DedupKey::ById {
            category,
            id: record.id.clone(),
        };
        if !self.ledger.should_process(&key) {
            tracing::debug!(
                category = %category,
                record = %record.id,
                "duplicate change suppressed",
            );
            self.bump(|c| c.deduped += 1).await;
            return;
        }

        let dispatched = self.fan_out(&event, &record).await;
        if dispatched {
            self.ledger.mark_processed(key);
        }
        self.bump(|c| c.processed += 1).await;
    }

    /// Push to remote store and VCS concurrently, then notify if the
    /// category announces changes. Returns whether the event counts as
    /// dispatched for dedup purposes.
    async fn fan_out(&mut self, event: &ChangeEvent, record: &Record) -> bool {
        let expected_existing = event.kind == ChangeKind::Modified;

        let upsert = Arc::clone(&self.sinks.upsert);
        let upsert_record = record.clone();
        let remote_task = tokio::task::spawn_blocking(move || {
            upsert.push(&upsert_record, expected_existing)
        });

        let publish = Arc::clone(&self.sinks.publish);
        let vcs_task = tokio::task::spawn_blocking(move || publish.push());

        let (remote_outcome, vcs_outcome) = tokio::join!(remote_task, vcs_task);
        let remote_outcome = flatten_join("remote-store", remote_outcome);
        let vcs_outcome = flatten_join("vcs", vcs_outcome);

        self.log_outcome("remote-store", record, &remote_outcome);
        self.log_outcome("vcs", record, &vcs_outcome);
        self.bump(|c| match remote_outcome.is_success() {
            true => c.remote_success += 1,
            false => c.remote_failure += 1,
        })
        .await;
        self.bump(|c| match vcs_outcome.is_success() {
            true => c.vcs_success += 1,
            false => c.vcs_failure += 1,
        })
        .await;

        if !record.category.notifies() {
            return remote_outcome.is_success();
        }

        let address = resolve(&self.root, &self.notify_config, record);
        let text = format_notification(record);

        self.limiter.await_turn().await;

        let notify = Arc::clone(&self.sinks.notify);
        let notify_task =
            tokio::task::spawn_blocking(move || notify.send(&address, &text));
        let notify_outcome = flatten_join("notify", notify_task.await);

        self.log_outcome("notify", record, &notify_outcome);
        self.bump(|c| match notify_outcome.is_success() {
            true => c.notify_success += 1,
            false => c.notify_failure += 1,
        })
        .await;

        notify_outcome.is_success()
    }

    /// Malformed input is skipped and logged, never retried. A content-hash
    /// key suppresses repeat warnings while the bad file stays unchanged.
    async fn handle_malformed(
        &mut self,
        event: &ChangeEvent,
        category: Category,
        err: &swarmlink_core::CoreError,
    ) {
        self.bump(|c| c.malformed += 1).await;

        let digest = match std::fs::read(&event.path) {
            Ok(bytes) => hex::encode(Sha256::digest(&bytes)),
            Err(_) => return,
        };
        let key = DedupKey::ByContent {
            path: event.path.clone(),
            digest,
        };
        if self.ledger.should_process(&key) {
            tracing::warn!(
                path = %event.path.display(),
                category = %category,
                error = %err,
                "malformed record skipped",
            );
            self.ledger.mark_processed(key);
        }
    }

    fn log_outcome(&self, sink: &str, record: &Record, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Success => {
                tracing::info!(sink, category = %record.category, record = %record.id, "sink push succeeded");
            }
            DispatchOutcome::RetryableFailure(reason) => {
                tracing::error!(sink, category = %record.category, record = %record.id, reason, "sink push failed after retries");
            }
            DispatchOutcome::FatalFailure(reason) => {
                tracing::error!(sink, category = %record.category, record = %record.id, reason, "sink push failed fatally");
            }
        }
    }

    async fn bump(&self, apply: impl FnOnce(&mut SinkCounters)) {
        let mut counters = self.counters.write().await;
        apply(&mut counters);
    }
}

fn flatten_join(
    sink: &str,
    joined: Result<DispatchOutcome, tokio::task::JoinError>,
) -> DispatchOutcome {
    joined.unwrap_or_else(|err| {
        DispatchOutcome::FatalFailure(format!("{sink} worker panicked: {err}"))
    })
}
