use chrono::Utc;
use rv_core::channel::{encode_frame, DEFAULT_MAX_FRAME_BYTES};
use rv_core::{Message, ServerFrame};
use std::{
    collections::{HashMap, VecDeque},
    sync::atomic::{AtomicU64, Ordering},
};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{info, warn};

pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Retained command-link history plus the sessions it fans out to.
///
/// Attaching a session and accepting a message take the same lock, so a
/// session always receives its history frame first and then every message
/// accepted after that snapshot, in acceptance order. A session that cannot
/// keep up is evicted and told to close, so its client reconnects and gets a
/// fresh history instead of silently missing feedback.
pub struct SessionStore {
    history_capacity: usize,
    conn_counter: AtomicU64,
    inner: Mutex<StoreInner>,
}

struct StoreInner {
    next_message_id: u64,
    history: VecDeque<Message>,
    subscribers: HashMap<String, Subscriber>,
}

struct Subscriber {
    sender: mpsc::Sender<String>,
    evicted: oneshot::Sender<()>,
}

impl Subscriber {
    fn evict(self) {
        let _ = self.evicted.send(());
    }
}

impl SessionStore {
    pub fn new(history_capacity: usize) -> Self {
        assert!(history_capacity > 0, "history_capacity must be greater than 0");
        Self {
            history_capacity,
            conn_counter: AtomicU64::new(0),
            inner: Mutex::new(StoreInner {
                next_message_id: 0,
                history: VecDeque::with_capacity(history_capacity),
                subscribers: HashMap::new(),
            }),
        }
    }

    pub fn history_capacity(&self) -> usize {
        self.history_capacity
    }

    pub fn next_conn_id(&self) -> String {
        let id = self.conn_counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("conn-{id}")
    }

    /// Queues the history replay for `conn_id`, then registers it for
    /// feedback. The returned receiver resolves once the store evicts the
    /// session; `None` means the session's queue rejected the replay.
    pub async fn attach(
        &self,
        conn_id: &str,
        sender: mpsc::Sender<String>,
    ) -> Option<oneshot::Receiver<()>> {
        let mut inner = self.inner.lock().await;
        let frame = ServerFrame::History {
            messages: inner.history.iter().cloned().collect(),
        };
        let text = match encode_frame(&frame, DEFAULT_MAX_FRAME_BYTES) {
            Ok(value) => value,
            Err(err) => {
                warn!(event = "history_encode_error", conn_id = conn_id, error = %err);
                return None;
            }
        };
        if sender.try_send(text).is_err() {
            warn!(event = "history_send_error", conn_id = conn_id);
            return None;
        }
        let (evicted, evicted_rx) = oneshot::channel();
        inner
            .subscribers
            .insert(conn_id.to_string(), Subscriber { sender, evicted });
        info!(
            event = "history_sent",
            conn_id = conn_id,
            count = inner.history.len(),
            subscribers = inner.subscribers.len()
        );
        Some(evicted_rx)
    }

    pub async fn detach(&self, conn_id: &str) -> bool {
        self.inner.lock().await.subscribers.remove(conn_id).is_some()
    }

    /// Drops `conn_id` from the fan-out and signals its connection to close.
    pub async fn evict(&self, conn_id: &str) -> bool {
        match self.inner.lock().await.subscribers.remove(conn_id) {
            Some(subscriber) => {
                subscriber.evict();
                true
            }
            None => false,
        }
    }

    /// Records a message and broadcasts it as feedback.
    pub async fn accept(&self, user: &str, text: &str) -> Message {
        let mut inner = self.inner.lock().await;
        inner.next_message_id += 1;
        let entry = Message {
            id: inner.next_message_id.to_string(),
            user: user.to_string(),
            message: text.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        };
        inner.history.push_back(entry.clone());
        while inner.history.len() > self.history_capacity {
            inner.history.pop_front();
        }

        match encode_frame(&ServerFrame::Feedback(entry.clone()), DEFAULT_MAX_FRAME_BYTES) {
            Ok(raw) => inner.broadcast(&raw),
            Err(err) => warn!(event = "feedback_encode_error", id = %entry.id, error = %err),
        }
        entry
    }

    pub async fn history(&self) -> Vec<Message> {
        self.inner.lock().await.history.iter().cloned().collect()
    }

    pub async fn subscriber_count(&self) -> usize {
        self.inner.lock().await.subscribers.len()
    }
}

impl StoreInner {
    fn broadcast(&mut self, raw: &str) {
        let mut dropped = Vec::new();
        for (conn_id, subscriber) in &self.subscribers {
            if subscriber.sender.try_send(raw.to_string()).is_err() {
                warn!(event = "subscriber_evicted", conn_id = %conn_id);
                dropped.push(conn_id.clone());
            }
        }
        for conn_id in dropped {
            if let Some(subscriber) = self.subscribers.remove(&conn_id) {
                subscriber.evict();
            }
        }
    }
}
