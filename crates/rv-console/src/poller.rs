use crate::error::{ConfigError, PollError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rv_core::{Alert, RecentAlerts, SwarmStatus};
use serde::de::DeserializeOwned;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, PoisonError, RwLock,
};
use std::time::Duration;
use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

const SWARM_STATUS_PATH: &str = "uav/swarm-status";
const CRITICAL_ALERTS_PATH: &str = "uav/critical-alerts";

/// Read-only monitoring endpoints polled by the console.
#[async_trait]
pub trait MonitoringApi: Send + Sync + 'static {
    async fn swarm_status(&self) -> Result<SwarmStatus, PollError>;
    async fn critical_alerts(&self) -> Result<Vec<Alert>, PollError>;
}

pub struct HttpMonitoringApi {
    base: Url,
    client: reqwest::Client,
}

impl HttpMonitoringApi {
    pub fn new(mut base: Url, timeout: Duration) -> Result<Self, ConfigError> {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ConfigError::HttpClient(err.to_string()))?;
        Ok(Self { base, client })
    }

    pub fn endpoint(&self, path: &'static str) -> Result<Url, PollError> {
        self.base.join(path).map_err(|err| PollError::Request {
            endpoint: path,
            message: err.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &'static str) -> Result<T, PollError> {
        let url = self.endpoint(path)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| PollError::Request {
                endpoint: path,
                message: err.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(PollError::Status {
                endpoint: path,
                status: status.as_u16(),
            });
        }
        response.json::<T>().await.map_err(|err| PollError::Decode {
            endpoint: path,
            message: err.to_string(),
        })
    }
}

#[async_trait]
impl MonitoringApi for HttpMonitoringApi {
    async fn swarm_status(&self) -> Result<SwarmStatus, PollError> {
        self.get_json(SWARM_STATUS_PATH).await
    }

    async fn critical_alerts(&self) -> Result<Vec<Alert>, PollError> {
        self.get_json(CRITICAL_ALERTS_PATH).await
    }
}

/// Copy of the feed handed to the view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedSnapshot {
    pub status: Option<SwarmStatus>,
    pub alerts: Vec<Alert>,
    pub last_update: Option<DateTime<Utc>>,
    pub applied_cycles: u64,
    pub failed_cycles: u64,
}

#[derive(Debug, Default)]
struct FeedState {
    status: Option<SwarmStatus>,
    alerts: RecentAlerts,
    last_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct PollStats {
    applied: AtomicU64,
    failed: AtomicU64,
    discarded: AtomicU64,
}

impl PollStats {
    pub fn applied(&self) -> u64 {
        self.applied.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Cycles that completed after the poller was stopped or restarted.
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }
}

struct Shared {
    state: RwLock<FeedState>,
    generation: AtomicU64,
    stats: PollStats,
    revision: watch::Sender<u64>,
}

impl Shared {
    fn apply(&self, generation: u64, status: SwarmStatus, alerts: Vec<Alert>) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if self.generation.load(Ordering::SeqCst) != generation {
            self.stats.discarded.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        let batch = alerts.len();
        state.status = Some(status);
        state.alerts.merge_batch(alerts);
        state.last_update = Some(Utc::now());
        drop(state);
        self.stats.applied.fetch_add(1, Ordering::Relaxed);
        self.revision.send_modify(|rev| *rev += 1);
        debug!(event = "poll_applied", generation, alerts = batch);
        true
    }

    fn record_failure(&self, generation: u64, err: &PollError) {
        let _state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if self.generation.load(Ordering::SeqCst) != generation {
            self.stats.discarded.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.stats.failed.fetch_add(1, Ordering::Relaxed);
        warn!(event = "poll_failed", generation, error = %err);
    }
}

/// Periodically refreshes the swarm status and the recent-alerts window.
///
/// Ticks are measured poll-start to poll-start: each tick spawns its own
/// cycle, so a slow cycle never holds back the next one. Every cycle carries
/// the generation it was started under and is applied only if that
/// generation is still current when it takes the state lock.
pub struct AlertPoller {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Default for AlertPoller {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertPoller {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(FeedState::default()),
                generation: AtomicU64::new(0),
                stats: PollStats::default(),
                revision,
            }),
            task: Mutex::new(None),
        }
    }

    /// Starts polling, first cycle immediately. Restarting discards whatever
    /// the previous run still has in flight.
    pub fn start<A: MonitoringApi>(&self, api: Arc<A>, interval: Duration) {
        assert!(!interval.is_zero(), "poll interval must be greater than 0");
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = task.take() {
            previous.abort();
        }
        let generation = self.bump_generation();
        let shared = self.shared.clone();
        info!(event = "poller_start", generation, interval_ms = interval.as_millis() as u64);
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                tokio::spawn(run_cycle(shared.clone(), api.clone(), generation));
            }
        }));
    }

    /// Cancels the recurrence. Cycles already in flight complete without
    /// touching the feed.
    pub fn stop(&self) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        let generation = self.bump_generation();
        if let Some(handle) = task.take() {
            handle.abort();
            info!(event = "poller_stop", generation);
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        let state = self.shared.state.read().unwrap_or_else(PoisonError::into_inner);
        FeedSnapshot {
            status: state.status.clone(),
            alerts: state.alerts.to_vec(),
            last_update: state.last_update,
            applied_cycles: self.shared.stats.applied(),
            failed_cycles: self.shared.stats.failed(),
        }
    }

    /// Revision counter bumped after every applied cycle.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.revision.subscribe()
    }

    pub fn stats(&self) -> &PollStats {
        &self.shared.stats
    }

    fn bump_generation(&self) -> u64 {
        let _state = self.shared.state.write().unwrap_or_else(PoisonError::into_inner);
        self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Drop for AlertPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_cycle<A: MonitoringApi>(shared: Arc<Shared>, api: Arc<A>, generation: u64) {
    let (status, alerts) = tokio::join!(api.swarm_status(), api.critical_alerts());
    match (status, alerts) {
        (Ok(status), Ok(alerts)) => {
            if !shared.apply(generation, status, alerts) {
                debug!(event = "poll_discarded", generation);
            }
        }
        (Err(err), _) | (_, Err(err)) => shared.record_failure(generation, &err),
    }
}
