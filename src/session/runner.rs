//! Session runner - the single task that owns the [`ControlSession`].
//!
//! Provides the async face of the session for the rest of the application:
//!
//! ```text
//! UI thread ─┐                                   ┌─► broadcast<SessionEvent>
//! Gamepad  ──┼─[SessionRequest]─► SessionRunner ─┤
//!            │                     ▲      │      └─► watch<SessionState>
//!            │        (LinkId, LinkEvent) │ open/send/close
//!            │                     │      ▼
//!            │                   link tasks (websocket.rs)
//! ```
//!
//! Requests, link events and the reconnect deadline are handled one at a
//! time inside a single `select!` loop, so the state machine never sees two
//! things at once.

use super::control::ControlSession;
use super::transport::{Connector, LinkEvent, LinkId};
use super::websocket::WsConnector;
use super::{SessionEvent, SessionListener, SessionSettings, SessionState};
use crate::protocol::{BatteryLevel, Command, SnapshotPayload};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const REQUEST_CHANNEL_CAPACITY: usize = 100;
const EVENT_CHANNEL_CAPACITY: usize = 64;
const LINK_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Requests accepted by the runner
#[derive(Debug, Clone, PartialEq)]
pub enum SessionRequest {
    Send(Command),
    ToggleVerbose,
}

/// Forwards lifecycle callbacks onto the broadcast channel.
pub struct EventPublisher {
    events: broadcast::Sender<SessionEvent>,
}

impl EventPublisher {
    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine, the panel may not be up yet
        if self.events.send(event).is_err() {
            debug!("No subscribers for session event");
        }
    }
}

impl SessionListener for EventPublisher {
    fn on_ready(&mut self, battery: BatteryLevel) {
        self.publish(SessionEvent::Ready(battery));
    }

    fn on_busy(&mut self) {
        self.publish(SessionEvent::Busy);
    }

    fn on_disconnected(&mut self) {
        self.publish(SessionEvent::Disconnected);
    }

    fn on_battery_update(&mut self, level: BatteryLevel) {
        self.publish(SessionEvent::Battery(level));
    }

    fn on_snapshot(&mut self, payload: SnapshotPayload) {
        self.publish(SessionEvent::Snapshot(payload));
    }
}

/// Cloneable command API of the session.
///
/// All methods are non-blocking and safe to call from the UI thread.
#[derive(Clone)]
pub struct SessionHandle {
    requests: mpsc::Sender<SessionRequest>,
    state: watch::Receiver<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    shutdown: CancellationToken,
}

impl SessionHandle {
    /// Hands `command` to the session. It is transmitted only if the session
    /// is ready when the runner gets to it; otherwise it is dropped.
    pub fn send(&self, command: Command) {
        self.request(SessionRequest::Send(command));
    }

    pub fn toggle_verbose(&self) {
        self.request(SessionRequest::ToggleVerbose);
    }

    fn request(&self, request: SessionRequest) {
        match self.requests.try_send(request) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(request)) => {
                warn!("Session request queue full, dropping {:?}", request);
            }
            Err(mpsc::error::TrySendError::Closed(request)) => {
                debug!("Session runner stopped, dropping {:?}", request);
            }
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Stops the runner; open links are dropped with it.
    pub fn shutdown(&self) {
        info!("Session shutdown requested");
        self.shutdown.cancel();
    }
}

pub struct SessionRunner<C: Connector> {
    session: ControlSession<C, EventPublisher>,
    requests: mpsc::Receiver<SessionRequest>,
    link_events: mpsc::UnboundedReceiver<(LinkId, LinkEvent)>,
    state_tx: watch::Sender<SessionState>,
    shutdown: CancellationToken,
}

impl SessionRunner<WsConnector> {
    /// Spawns a runner talking WebSocket to `url`.
    pub fn spawn(
        url: impl Into<String>,
        settings: SessionSettings,
    ) -> (SessionHandle, JoinHandle<()>) {
        let url = url.into();
        info!("Spawning session runner for {}", url);
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        Self::spawn_with(WsConnector::new(url, link_tx), link_rx, settings)
    }
}

impl<C> SessionRunner<C>
where
    C: Connector + Send + 'static,
    C::Transport: Send + 'static,
{
    /// Spawns a runner over any connector. `link_events` must be the
    /// receiving end of the channel the connector reports on.
    pub fn spawn_with(
        connector: C,
        link_events: mpsc::UnboundedReceiver<(LinkId, LinkEvent)>,
        settings: SessionSettings,
    ) -> (SessionHandle, JoinHandle<()>) {
        let (requests_tx, requests_rx) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);
        let shutdown = CancellationToken::new();

        let publisher = EventPublisher {
            events: events_tx.clone(),
        };
        let runner = SessionRunner {
            session: ControlSession::new(connector, publisher, settings),
            requests: requests_rx,
            link_events,
            state_tx,
            shutdown: shutdown.clone(),
        };

        let handle = SessionHandle {
            requests: requests_tx,
            state: state_rx,
            events: events_tx,
            shutdown,
        };

        let task = tokio::spawn(async move {
            info!("Session runner task started");
            runner.run().await;
            info!("Session runner task finished");
        });

        (handle, task)
    }

    async fn run(mut self) {
        self.session.start();

        loop {
            let deadline = self.session.next_deadline();

            // Queued requests go before shutdown so a final exit still leaves
            tokio::select! {
                biased;

                request = self.requests.recv() => match request {
                    Some(request) => self.handle_request(request),
                    None => {
                        info!("All session handles dropped, stopping runner");
                        break;
                    }
                },
                _ = self.shutdown.cancelled() => {
                    info!("Session runner shutting down");
                    break;
                }
                Some((link, event)) = self.link_events.recv() => {
                    self.session.handle_link_event(link, event, Instant::now());
                }
                _ = sleep_until(deadline) => {
                    self.session.fire_due_timers(Instant::now());
                }
            }

            self.publish_state();
        }

        self.close_link().await;
    }

    /// Flushes requests still queued and waits for the live link to finish
    /// its close handshake.
    async fn close_link(&mut self) {
        while let Ok(request) = self.requests.try_recv() {
            self.handle_request(request);
        }
        let Some(link) = self.session.shut_down() else {
            return;
        };

        let closed = async {
            while let Some((id, event)) = self.link_events.recv().await {
                if id == link && event == LinkEvent::Closed {
                    break;
                }
            }
        };
        if tokio::time::timeout(LINK_CLOSE_TIMEOUT, closed).await.is_err() {
            warn!("Link {} did not close within {:?}", link, LINK_CLOSE_TIMEOUT);
        } else {
            debug!("Link {} closed", link);
        }
    }

    fn handle_request(&mut self, request: SessionRequest) {
        match request {
            SessionRequest::Send(command) => {
                self.session.send(command);
            }
            SessionRequest::ToggleVerbose => {
                self.session.toggle_verbose();
            }
        }
    }

    fn publish_state(&self) {
        let state = self.session.state();
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            debug!("Session state {} -> {}", current, state);
            *current = state;
            true
        });
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
