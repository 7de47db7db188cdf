use crate::error::LinkError;
use crate::transport::ChannelHandle;
use rv_core::channel::DEFAULT_MAX_FRAME_BYTES;
use rv_core::{ClientFrame, Message, ServerFrame};
use std::time::Duration;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use url::Url;

const EVENT_QUEUE: usize = 256;
const SUBMISSION_QUEUE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Reconnecting { attempt: u32, delay: Duration },
    Closed,
}

impl ConnectionState {
    /// Liveness label shown in the console header.
    pub fn label(&self) -> String {
        match self {
            ConnectionState::Connecting => "CONNECTING".to_string(),
            ConnectionState::Open => "LIVE".to_string(),
            ConnectionState::Reconnecting { attempt, .. } => format!("RECONNECTING ({attempt})"),
            ConnectionState::Closed => "OFFLINE".to_string(),
        }
    }
}

/// What the session driver reports to whoever owns the `CommandLink`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Connecting,
    Frame(ServerFrame),
    Reconnecting { attempt: u32, delay: Duration },
    Closed,
}

/// Operator-side view of the command link: the message list, the liveness
/// state and the pending input line.
#[derive(Debug, Clone)]
pub struct CommandLink {
    user: String,
    messages: Vec<Message>,
    state: ConnectionState,
    input: String,
    history_seen: bool,
}

impl CommandLink {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            messages: Vec::new(),
            state: ConnectionState::Connecting,
            input: String::new(),
            history_seen: false,
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn push_char(&mut self, ch: char) {
        self.input.push(ch);
    }

    pub fn pop_char(&mut self) {
        self.input.pop();
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn apply(&mut self, event: LinkEvent) {
        if self.state == ConnectionState::Closed {
            return;
        }
        match event {
            LinkEvent::Connecting => {
                self.messages.clear();
                self.history_seen = false;
                self.state = ConnectionState::Connecting;
            }
            LinkEvent::Frame(ServerFrame::History { messages }) => {
                self.messages = messages;
                self.history_seen = true;
                self.state = ConnectionState::Open;
            }
            LinkEvent::Frame(ServerFrame::Feedback(message)) => {
                if !self.history_seen {
                    debug!(event = "feedback_before_history", id = %message.id);
                    return;
                }
                self.messages.push(message);
            }
            LinkEvent::Reconnecting { attempt, delay } => {
                self.state = ConnectionState::Reconnecting { attempt, delay };
            }
            LinkEvent::Closed => {
                self.state = ConnectionState::Closed;
            }
        }
    }

    /// Takes the input line as a submission. Only an open link with
    /// non-blank input yields a frame; the text goes out as typed.
    pub fn submit(&mut self) -> Option<ClientFrame> {
        if self.state != ConnectionState::Open || self.input.trim().is_empty() {
            return None;
        }
        let text = std::mem::take(&mut self.input);
        Some(ClientFrame::message(self.user.clone(), text))
    }

    pub fn close(&mut self) {
        self.state = ConnectionState::Closed;
    }
}

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Consecutive failed attempts tolerated before giving up.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn next_delay(&self, current: Duration) -> Duration {
        let next = current + current;
        if next > self.max_delay {
            self.max_delay
        } else {
            next
        }
    }
}

#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub endpoint: Url,
    pub max_frame_bytes: usize,
    pub reconnect: ReconnectPolicy,
}

impl LinkConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Handle to the session driver task.
pub struct CommandLinkClient {
    submissions: mpsc::Sender<ClientFrame>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl CommandLinkClient {
    pub fn spawn(config: LinkConfig) -> (Self, mpsc::Receiver<LinkEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE);
        let (submit_tx, submit_rx) = mpsc::channel(SUBMISSION_QUEUE);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_link(config, event_tx, submit_rx, shutdown_rx));
        let client = Self {
            submissions: submit_tx,
            shutdown: shutdown_tx,
            task: Some(task),
        };
        (client, event_rx)
    }

    pub fn submit(&self, frame: ClientFrame) -> Result<(), LinkError> {
        self.submissions.try_send(frame).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => {
                LinkError::Connection("submission queue is full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => LinkError::ChannelClosed,
        })
    }

    /// Stops the driver and waits for it to close the transport.
    pub async fn close(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

enum PumpExit {
    Shutdown,
    ViewGone,
    Dropped,
}

async fn run_link(
    config: LinkConfig,
    events: mpsc::Sender<LinkEvent>,
    mut submissions: mpsc::Receiver<ClientFrame>,
    mut shutdown: watch::Receiver<bool>,
) {
    let policy = config.reconnect.clone();
    let mut attempt = 0u32;
    let mut delay = policy.initial_delay;
    loop {
        if events.send(LinkEvent::Connecting).await.is_err() {
            return;
        }
        let opened = tokio::select! {
            result = ChannelHandle::open(&config.endpoint, config.max_frame_bytes) => result,
            _ = wait_for_shutdown(&mut shutdown) => break,
        };
        match opened {
            Ok(mut handle) => {
                info!(event = "link_open", endpoint = %config.endpoint);
                attempt = 0;
                delay = policy.initial_delay;
                while submissions.try_recv().is_ok() {}
                let exit = pump(&mut handle, &events, &mut submissions, &mut shutdown).await;
                handle.close();
                match exit {
                    PumpExit::Shutdown => break,
                    PumpExit::ViewGone => return,
                    PumpExit::Dropped => warn!(event = "link_dropped", endpoint = %config.endpoint),
                }
            }
            Err(err) => {
                warn!(event = "link_connect_error", endpoint = %config.endpoint, error = %err);
            }
        }

        if !policy.enabled {
            break;
        }
        attempt += 1;
        if policy.max_attempts.is_some_and(|max| attempt > max) {
            warn!(event = "link_gave_up", attempts = attempt - 1);
            break;
        }
        if events
            .send(LinkEvent::Reconnecting { attempt, delay })
            .await
            .is_err()
        {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = wait_for_shutdown(&mut shutdown) => break,
        }
        delay = policy.next_delay(delay);
    }
    info!(event = "link_closed", endpoint = %config.endpoint);
    let _ = events.send(LinkEvent::Closed).await;
}

async fn pump(
    handle: &mut ChannelHandle,
    events: &mpsc::Sender<LinkEvent>,
    submissions: &mut mpsc::Receiver<ClientFrame>,
    shutdown: &mut watch::Receiver<bool>,
) -> PumpExit {
    loop {
        tokio::select! {
            frame = handle.next_frame() => match frame {
                Some(Ok(frame)) => {
                    if events.send(LinkEvent::Frame(frame)).await.is_err() {
                        return PumpExit::ViewGone;
                    }
                }
                Some(Err(err)) => warn!(event = "link_malformed_payload", error = %err),
                None => return PumpExit::Dropped,
            },
            Some(frame) = submissions.recv() => {
                if let Err(err) = handle.send(&frame).await {
                    warn!(event = "link_send_error", error = %err);
                    return PumpExit::Dropped;
                }
            }
            _ = wait_for_shutdown(shutdown) => return PumpExit::Shutdown,
        }
    }
}

/// Resolves once shutdown is requested or the client handle is gone.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
