//! The control session state machine.
//!
//! [`ControlSession`] is synchronous and transport-agnostic: it is fed link
//! events and timer ticks by its owner and reacts by opening/closing links,
//! writing frames and calling its [`SessionListener`].

use super::transport::{Connector, LinkEvent, LinkId, Transport};
use super::{SessionListener, SessionSettings, SessionState};
use crate::protocol::{decode, Command, InboundFrame, WireFrame};
use crate::timer::Timer;
use tokio::time::Instant;
use tracing::{debug, info, warn};

struct ActiveLink<T> {
    id: LinkId,
    transport: T,
}

pub struct ControlSession<C: Connector, L: SessionListener> {
    state: SessionState,

    // Last state announced to the listener. Busy survives reconnect attempts
    // so a rejected client hears "busy" only once.
    announced: SessionState,

    connector: C,
    listener: L,

    // At most one live link; replaced, never mutated, on reconnect
    link: Option<ActiveLink<C::Transport>>,
    next_link_id: u64,

    reconnect: Timer,
    verbose: bool,
}

impl<C: Connector, L: SessionListener> ControlSession<C, L> {
    pub fn new(connector: C, listener: L, settings: SessionSettings) -> Self {
        info!(
            "Creating control session with reconnect delay {:?}",
            settings.reconnect_delay
        );
        Self {
            state: SessionState::Disconnected,
            announced: SessionState::Disconnected,
            connector,
            listener,
            link: None,
            next_link_id: 0,
            reconnect: Timer::new(settings.reconnect_delay),
            verbose: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current_link(&self) -> Option<LinkId> {
        self.link.as_ref().map(|link| link.id)
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Flips verbose frame logging. Returns the new value.
    pub fn toggle_verbose(&mut self) -> bool {
        self.verbose = !self.verbose;
        info!(
            "Verbose network logging {}",
            if self.verbose { "enabled" } else { "disabled" }
        );
        self.verbose
    }

    /// Makes the first connection attempt.
    pub fn start(&mut self) {
        self.connection_attempt();
    }

    /// Deadline of the pending reconnect attempt, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.reconnect.deadline()
    }

    /// Runs timer work whose deadline has passed.
    pub fn fire_due_timers(&mut self, now: Instant) {
        if self.reconnect.take_due(now) {
            debug!("Reconnect timer fired");
            self.connection_attempt();
        }
    }

    /// Transmits `command` if the device is ready, drops it otherwise.
    ///
    /// Returns whether the command went out on the wire. Dropping is the
    /// defined behaviour while not ready, not an error.
    pub fn send(&mut self, command: Command) -> bool {
        if self.state != SessionState::Ready {
            debug!("Dropping '{}' while session is {}", command, self.state);
            return false;
        }
        let Some(link) = self.link.as_mut() else {
            warn!("Session is ready without a link, dropping '{}'", command);
            return false;
        };

        let frame = command.encode();
        if self.verbose {
            info!("Network sending on {}: {}", link.id, frame.trim_end());
        } else {
            debug!("Sending '{}' on link {}", command, link.id);
        }

        if let Err(e) = link.transport.send_text(frame) {
            warn!("Failed to send '{}': {}", command, e);
            return false;
        }

        if command == Command::Exit {
            info!("Exit sent, closing link {}", link.id);
            link.transport.close();
        }
        true
    }

    /// Closes the live link for good and cancels any pending reconnect.
    ///
    /// Returns the closed link so the owner can wait for its `Closed` event.
    pub fn shut_down(&mut self) -> Option<LinkId> {
        self.reconnect.stop();
        let link = self.link.as_mut()?;
        info!("Shutting down, closing link {}", link.id);
        link.transport.close();
        Some(link.id)
    }

    /// Feeds an event from link `id` into the state machine.
    ///
    /// Events from links that are no longer current are discarded.
    pub fn handle_link_event(&mut self, id: LinkId, event: LinkEvent, now: Instant) {
        match &self.link {
            Some(active) if active.id == id => {}
            _ => {
                debug!("Ignoring {} event from retired link {}", event.kind(), id);
                return;
            }
        }

        match event {
            LinkEvent::Opened => {
                info!("Link {} open, waiting for device status", id);
            }
            LinkEvent::Frame(frame) => self.handle_frame(frame),
            LinkEvent::Closed => {
                info!("Link {} closed", id);
                self.link_lost(now);
            }
            LinkEvent::Error(reason) => {
                warn!("Link {} failed: {}", id, reason);
                self.link_lost(now);
            }
        }
    }

    fn connection_attempt(&mut self) {
        if self.state == SessionState::Ready {
            debug!("Already connected, skipping connection attempt");
            return;
        }
        // A fresh attempt supersedes any pending one
        self.reconnect.stop();

        let id = LinkId(self.next_link_id);
        self.next_link_id += 1;
        info!("Connecting to device (link {})", id);

        let transport = self.connector.open(id);
        let retired = self.link.replace(ActiveLink { id, transport });
        if let Some(mut old) = retired {
            debug!("Retiring link {}", old.id);
            old.transport.close();
        }
    }

    fn handle_frame(&mut self, frame: WireFrame) {
        if self.verbose {
            match &frame {
                WireFrame::Text(text) => info!("Network received: {}", text.trim_end()),
                WireFrame::Binary(bytes) => info!("Network received {} binary bytes", bytes.len()),
            }
        }

        let inbound = match decode(frame) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!("Network: bad message: {}", e);
                return;
            }
        };

        match inbound {
            InboundFrame::Ready(battery) => {
                if self.state == SessionState::Ready {
                    warn!("Network: unexpected 'ready' while already ready");
                    return;
                }
                info!("Device ready, battery {}", battery);
                self.state = SessionState::Ready;
                self.announced = SessionState::Ready;
                self.listener.on_ready(battery);
                self.listener.on_battery_update(battery);
            }
            InboundFrame::Busy => {
                if self.announced != SessionState::Busy {
                    info!("Device is busy with another operator");
                    self.listener.on_busy();
                    self.announced = SessionState::Busy;
                }
                self.state = SessionState::Busy;
                // Nothing useful can be sent; free the device and retry later
                if let Some(link) = self.link.as_mut() {
                    debug!("Closing link {} after busy", link.id);
                    link.transport.close();
                }
            }
            InboundFrame::Battery(level) => {
                if self.state == SessionState::Ready {
                    debug!("Battery update: {}", level);
                    self.listener.on_battery_update(level);
                } else {
                    warn!("Network: 'battery' while {}, ignoring", self.state);
                }
            }
            InboundFrame::Snapshot(payload) => {
                if self.state == SessionState::Ready {
                    debug!("Snapshot received: {:?}", payload);
                    self.listener.on_snapshot(payload);
                } else {
                    warn!("Network: 'snapshot' while {}, ignoring", self.state);
                }
            }
        }
    }

    fn link_lost(&mut self, now: Instant) {
        // Retire the handle; late events from it are ignored from here on
        self.link = None;

        if self.announced == SessionState::Ready {
            info!("Lost connection to device");
            self.announced = SessionState::Disconnected;
            self.listener.on_disconnected();
        }
        self.state = SessionState::Disconnected;

        if self.reconnect.schedule_once(now) {
            info!("Reconnecting in {:?}", self.reconnect.period());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Axis, BatteryLevel, SnapshotPayload};
    use crate::session::transport::TransportError;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tokio::time::Duration;

    #[derive(Debug, Default)]
    struct LinkRecord {
        id: u64,
        sent: Vec<String>,
        closed: bool,
    }

    type Links = Rc<RefCell<Vec<LinkRecord>>>;

    #[derive(Default)]
    struct FakeConnector {
        links: Links,
    }

    struct FakeTransport {
        links: Links,
        index: usize,
    }

    impl Transport for FakeTransport {
        fn send_text(&mut self, frame: String) -> Result<(), TransportError> {
            let mut links = self.links.borrow_mut();
            let record = &mut links[self.index];
            if record.closed {
                return Err(TransportError::Closed(LinkId(record.id)));
            }
            record.sent.push(frame);
            Ok(())
        }

        fn close(&mut self) {
            self.links.borrow_mut()[self.index].closed = true;
        }
    }

    impl Connector for FakeConnector {
        type Transport = FakeTransport;

        fn open(&mut self, link: LinkId) -> FakeTransport {
            let mut links = self.links.borrow_mut();
            links.push(LinkRecord {
                id: link.0,
                ..Default::default()
            });
            FakeTransport {
                links: self.links.clone(),
                index: links.len() - 1,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Notified {
        Ready(f64),
        Busy,
        Disconnected,
        Battery(f64),
        Snapshot(usize),
    }

    #[derive(Default)]
    struct RecordingListener {
        events: Vec<Notified>,
    }

    impl SessionListener for RecordingListener {
        fn on_ready(&mut self, battery: BatteryLevel) {
            self.events.push(Notified::Ready(battery.value()));
        }
        fn on_busy(&mut self) {
            self.events.push(Notified::Busy);
        }
        fn on_disconnected(&mut self) {
            self.events.push(Notified::Disconnected);
        }
        fn on_battery_update(&mut self, level: BatteryLevel) {
            self.events.push(Notified::Battery(level.value()));
        }
        fn on_snapshot(&mut self, payload: SnapshotPayload) {
            self.events.push(Notified::Snapshot(payload.len()));
        }
    }

    type TestSession = ControlSession<FakeConnector, RecordingListener>;

    const DELAY: Duration = Duration::from_millis(5000);

    fn started() -> (TestSession, Links) {
        let connector = FakeConnector::default();
        let links = connector.links.clone();
        let mut session = ControlSession::new(
            connector,
            RecordingListener::default(),
            SessionSettings {
                reconnect_delay: DELAY,
            },
        );
        session.start();
        (session, links)
    }

    fn text(frame: &str) -> LinkEvent {
        LinkEvent::Frame(WireFrame::Text(frame.to_string()))
    }

    fn current(session: &TestSession) -> LinkId {
        session.current_link().expect("session should have a link")
    }

    fn make_ready(session: &mut TestSession, now: Instant) {
        let link = current(session);
        session.handle_link_event(link, LinkEvent::Opened, now);
        session.handle_link_event(link, text("[\"ready\", 87]\n"), now);
    }

    fn sent_on(links: &Links, index: usize) -> Vec<String> {
        links.borrow()[index].sent.clone()
    }

    #[test]
    fn starts_disconnected_with_one_link() {
        let (session, links) = started();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(links.borrow().len(), 1);
        assert_eq!(session.next_deadline(), None);
    }

    #[test]
    fn ready_frame_fires_ready_then_battery() {
        let (mut session, _links) = started();
        make_ready(&mut session, Instant::now());

        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(
            session.listener().events,
            vec![Notified::Ready(87.0), Notified::Battery(87.0)]
        );
    }

    #[test]
    fn send_reaches_wire_only_when_ready() {
        let (mut session, links) = started();
        let now = Instant::now();

        assert!(!session.send(Command::begin(Axis::Drive, 1.0)));
        assert!(sent_on(&links, 0).is_empty());

        make_ready(&mut session, now);
        assert!(session.send(Command::begin(Axis::Drive, 1.0)));
        assert_eq!(sent_on(&links, 0), vec!["[\"begin\",\"drive\",1.0]\n"]);
    }

    #[test]
    fn busy_while_ready_closes_link_and_notifies_once() {
        let (mut session, links) = started();
        let now = Instant::now();
        make_ready(&mut session, now);

        let link = current(&session);
        session.handle_link_event(link, text("[\"busy\"]"), now);
        session.handle_link_event(link, text("[\"busy\"]"), now);

        assert_eq!(session.state(), SessionState::Busy);
        assert!(links.borrow()[0].closed, "session must close the link itself");
        let busy_count = session
            .listener()
            .events
            .iter()
            .filter(|e| **e == Notified::Busy)
            .count();
        assert_eq!(busy_count, 1);
    }

    #[test]
    fn send_while_busy_produces_no_traffic() {
        let (mut session, links) = started();
        let now = Instant::now();
        make_ready(&mut session, now);
        let link = current(&session);
        session.handle_link_event(link, text("[\"busy\"]"), now);

        assert!(!session.send(Command::begin(Axis::Drive, 1.0)));
        assert!(sent_on(&links, 0).is_empty());
    }

    #[test]
    fn close_while_ready_notifies_and_reconnects_once_after_delay() {
        let (mut session, links) = started();
        let now = Instant::now();
        make_ready(&mut session, now);

        let link = current(&session);
        session.handle_link_event(link, LinkEvent::Error("reset by peer".into()), now);
        session.handle_link_event(link, LinkEvent::Closed, now);

        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.current_link(), None);
        assert_eq!(
            session.listener().events.last(),
            Some(&Notified::Disconnected)
        );
        assert_eq!(session.next_deadline(), Some(now + DELAY));

        session.fire_due_timers(now + DELAY - Duration::from_millis(1));
        assert_eq!(links.borrow().len(), 1, "no reconnect before the delay");

        session.fire_due_timers(now + DELAY);
        assert_eq!(links.borrow().len(), 2);
        session.fire_due_timers(now + DELAY * 3);
        assert_eq!(links.borrow().len(), 2, "only one reconnect per loss");
        assert_eq!(session.next_deadline(), None);
    }

    #[test]
    fn busy_client_is_told_once_across_retries() {
        let (mut session, links) = started();
        let mut now = Instant::now();

        for attempt in 0..3 {
            let link = current(&session);
            session.handle_link_event(link, text("[\"busy\"]"), now);
            assert!(links.borrow()[attempt].closed);
            session.handle_link_event(link, LinkEvent::Closed, now);
            assert_eq!(session.state(), SessionState::Disconnected);
            now += DELAY;
            session.fire_due_timers(now);
        }

        assert_eq!(session.listener().events, vec![Notified::Busy]);
        assert_eq!(links.borrow().len(), 4);

        let link = current(&session);
        session.handle_link_event(link, text("[\"ready\", \"55\"]"), now);
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(
            session.listener().events,
            vec![Notified::Busy, Notified::Ready(55.0), Notified::Battery(55.0)]
        );
    }

    #[test]
    fn busy_then_close_does_not_fire_disconnected() {
        let (mut session, _links) = started();
        let now = Instant::now();
        make_ready(&mut session, now);
        let link = current(&session);
        session.handle_link_event(link, text("[\"busy\"]"), now);
        session.handle_link_event(link, LinkEvent::Closed, now);

        assert!(!session
            .listener()
            .events
            .contains(&Notified::Disconnected));
        assert!(session.next_deadline().is_some());
    }

    #[test]
    fn events_from_retired_links_are_ignored() {
        let (mut session, _links) = started();
        let now = Instant::now();
        let old = current(&session);
        session.handle_link_event(old, LinkEvent::Closed, now);
        session.fire_due_timers(now + DELAY);
        let new = current(&session);
        assert_ne!(old, new);

        session.handle_link_event(old, text("[\"ready\", 10]"), now + DELAY);
        assert_eq!(session.state(), SessionState::Disconnected);
        session.handle_link_event(old, LinkEvent::Closed, now + DELAY);
        assert_eq!(session.current_link(), Some(new));
        assert_eq!(session.next_deadline(), None);
        assert!(session.listener().events.is_empty());
    }

    #[test]
    fn malformed_and_out_of_state_frames_change_nothing() {
        let (mut session, _links) = started();
        let now = Instant::now();
        let link = current(&session);

        session.handle_link_event(link, text("garbage"), now);
        session.handle_link_event(link, text("[\"ready\"]"), now);
        session.handle_link_event(link, text("[\"battery\", 50]"), now);
        session.handle_link_event(link, text("[\"snapshot\", \"abcd\"]"), now);
        session.handle_link_event(link, LinkEvent::Frame(WireFrame::Binary(vec![1, 2])), now);
        session.handle_link_event(link, text("[\"launch\"]"), now);

        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.listener().events.is_empty());
        assert_eq!(session.current_link(), Some(link));

        make_ready(&mut session, now);
        session.handle_link_event(link, text("[\"ready\", 99]"), now);
        assert_eq!(session.listener().events.len(), 2, "second ready is ignored");
    }

    #[test]
    fn battery_and_snapshot_forwarded_while_ready() {
        let (mut session, _links) = started();
        let now = Instant::now();
        make_ready(&mut session, now);
        let link = current(&session);

        session.handle_link_event(link, text("[\"battery\", \"86\"]"), now);
        session.handle_link_event(link, text("[\"snapshot\", \"aGVsbG8=\"]"), now);
        session.handle_link_event(link, LinkEvent::Frame(WireFrame::Binary(vec![0; 16])), now);

        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(
            &session.listener().events[2..],
            &[
                Notified::Battery(86.0),
                Notified::Snapshot(8),
                Notified::Snapshot(16)
            ]
        );
    }

    #[test]
    fn exit_is_sent_then_link_closed() {
        let (mut session, links) = started();
        make_ready(&mut session, Instant::now());

        assert!(session.send(Command::Exit));
        assert_eq!(sent_on(&links, 0), vec!["[\"exit\"]\n"]);
        assert!(links.borrow()[0].closed);
    }

    #[test]
    fn verbose_toggle_has_no_protocol_effect() {
        let (mut session, links) = started();
        make_ready(&mut session, Instant::now());

        assert!(session.toggle_verbose());
        assert!(session.send(Command::Stop));
        assert!(!session.toggle_verbose());
        assert_eq!(sent_on(&links, 0), vec!["[\"stop\"]\n"]);
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn restarting_replaces_the_live_link() {
        let (mut session, links) = started();
        let first = current(&session);
        session.start();
        let second = current(&session);

        assert_ne!(first, second);
        assert!(links.borrow()[0].closed);
        assert!(!links.borrow()[1].closed);
    }

    #[test]
    fn shut_down_closes_link_and_cancels_reconnect() {
        let (mut session, links) = started();
        let now = Instant::now();
        make_ready(&mut session, now);
        let link = current(&session);

        assert_eq!(session.shut_down(), Some(link));
        assert!(links.borrow()[0].closed);

        session.handle_link_event(link, LinkEvent::Closed, now);
        assert!(session.next_deadline().is_some());
        assert_eq!(session.shut_down(), None);
        assert_eq!(session.next_deadline(), None);
    }
}
