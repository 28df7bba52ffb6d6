//! WebSocket links to the device (tokio-tungstenite).
//!
//! Every [`WsConnector::open`] spawns one link task that owns the socket. The
//! task forwards what it reads as [`LinkEvent`]s tagged with its [`LinkId`]
//! and writes whatever the matching [`WsTransport`] hands it. Dropping or
//! closing the transport ends the task; the task always reports
//! [`LinkEvent::Closed`] as its last event.

use super::transport::{Connector, LinkEvent, LinkId, Transport, TransportError};
use crate::protocol::WireFrame;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// Channel on which all links report back to the session runner
pub type LinkEventSender = mpsc::UnboundedSender<(LinkId, LinkEvent)>;

#[derive(Debug)]
enum Outbound {
    Text(String),
    Close,
}

pub struct WsConnector {
    url: String,
    events: LinkEventSender,
}

impl WsConnector {
    pub fn new(url: impl Into<String>, events: LinkEventSender) -> Self {
        Self {
            url: url.into(),
            events,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Connector for WsConnector {
    type Transport = WsTransport;

    fn open(&mut self, link: LinkId) -> WsTransport {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_link(
            link,
            self.url.clone(),
            outbound_rx,
            self.events.clone(),
        ));
        WsTransport {
            link,
            outbound: outbound_tx,
            task,
        }
    }
}

/// Outbound half of one WebSocket link.
pub struct WsTransport {
    link: LinkId,
    outbound: mpsc::UnboundedSender<Outbound>,
    task: JoinHandle<()>,
}

impl WsTransport {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Transport for WsTransport {
    fn send_text(&mut self, frame: String) -> Result<(), TransportError> {
        self.outbound
            .send(Outbound::Text(frame))
            .map_err(|_| TransportError::Closed(self.link))
    }

    fn close(&mut self) {
        if self.outbound.send(Outbound::Close).is_err() {
            debug!("Link {} already gone", self.link);
        }
    }
}

async fn run_link(
    link: LinkId,
    url: String,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: LinkEventSender,
) {
    debug!("Link {} connecting to {}", link, url);

    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            let _ = events.send((link, LinkEvent::Error(e.to_string())));
            let _ = events.send((link, LinkEvent::Closed));
            return;
        }
    };
    info!("Link {} connected to {}", link, url);
    let _ = events.send((link, LinkEvent::Opened));

    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            outgoing = outbound.recv() => match outgoing {
                Some(Outbound::Text(frame)) => {
                    if let Err(e) = write.send(Message::Text(frame)).await {
                        let _ = events.send((link, LinkEvent::Error(e.to_string())));
                        break;
                    }
                }
                // An explicit close and a dropped transport end the link alike
                Some(Outbound::Close) | None => {
                    debug!("Link {} closing", link);
                    if let Err(e) = write.close().await {
                        debug!("Link {} close handshake failed: {}", link, e);
                    }
                    break;
                }
            },
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send((link, LinkEvent::Frame(WireFrame::Text(text))));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    let _ = events.send((link, LinkEvent::Frame(WireFrame::Binary(bytes))));
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!("Link {} received close frame: {:?}", link, frame);
                    break;
                }
                // Ping/pong are answered by tungstenite itself
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Link {} read error: {}", link, e);
                    let _ = events.send((link, LinkEvent::Error(e.to_string())));
                    break;
                }
                None => break,
            },
        }
    }

    let _ = events.send((link, LinkEvent::Closed));
}
