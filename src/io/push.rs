use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::model::config::PushConfig;
use crate::model::event::{ChangeEvent, decode_event};

/// Error type for push-channel transports
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("could not connect: {0}")]
    Connect(String),
    #[error("connection closed")]
    Closed,
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One live connection to the change stream
pub trait PushConnection {
    /// Wait for the next text frame, up to the transport's read timeout.
    /// `Ok(None)` means nothing arrived in time.
    fn recv(&mut self) -> Result<Option<String>, PushError>;
    fn send_text(&mut self, text: &str) -> Result<(), PushError>;
    fn close(&mut self);
}

/// Opens connections; the channel worker calls `connect` again after each
/// disconnect.
pub trait PushTransport: Send + 'static {
    type Conn: PushConnection;
    fn connect(&mut self) -> Result<Self::Conn, PushError>;
}

/// Events sent from the push worker to the host loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Connection established; `reconnect` is false for the first one
    Connected { reconnect: bool },
    Event(ChangeEvent),
    /// The connection dropped; a reconnect is already scheduled
    Disconnected { reason: String },
}

/// The auto-reconnecting change stream, read on a background thread.
/// Call `poll()` each tick.
pub struct PushChannel {
    rx: mpsc::Receiver<ChannelEvent>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PushChannel {
    pub fn start<T: PushTransport>(transport: T, config: &PushConfig) -> Self {
        let (tx, rx) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let worker = Worker {
            tx,
            stop: Arc::clone(&stop),
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
            ping_interval: Duration::from_millis(config.ping_interval_ms),
        };
        let handle = thread::spawn(move || worker.run(transport));
        PushChannel {
            rx,
            stop,
            handle: Some(handle),
        }
    }

    /// Non-blocking poll for pending channel events.
    /// Returns all queued events (may be empty).
    pub fn poll(&self) -> Vec<ChannelEvent> {
        let mut events = Vec::new();
        while let Ok(evt) = self.rx.try_recv() {
            events.push(evt);
        }
        events
    }

    /// Block up to `timeout` for the next event
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ChannelEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Stop the worker and wait for it to exit
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PushChannel {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Worker {
    tx: mpsc::Sender<ChannelEvent>,
    stop: Arc<AtomicBool>,
    reconnect_delay: Duration,
    ping_interval: Duration,
}

impl Worker {
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn run<T: PushTransport>(self, mut transport: T) {
        let mut connected_before = false;
        while !self.stopped() {
            match transport.connect() {
                Ok(mut conn) => {
                    info!(reconnect = connected_before, "push channel connected");
                    if self
                        .tx
                        .send(ChannelEvent::Connected {
                            reconnect: connected_before,
                        })
                        .is_err()
                    {
                        conn.close();
                        return;
                    }
                    connected_before = true;
                    let reason = self.pump(&mut conn);
                    conn.close();
                    if self.stopped() {
                        return;
                    }
                    warn!(%reason, "push channel disconnected");
                    if self.tx.send(ChannelEvent::Disconnected { reason }).is_err() {
                        return;
                    }
                }
                Err(e) => warn!(error = %e, "push channel connect failed"),
            }
            self.sleep(self.reconnect_delay);
        }
    }

    /// Read until the connection fails or the channel is stopped.
    /// Returns why the connection ended.
    fn pump<C: PushConnection>(&self, conn: &mut C) -> String {
        let mut last_ping = Instant::now();
        loop {
            if self.stopped() {
                return "stopped".to_string();
            }
            if last_ping.elapsed() >= self.ping_interval {
                if let Err(e) = conn.send_text("ping") {
                    return e.to_string();
                }
                last_ping = Instant::now();
            }
            match conn.recv() {
                Ok(Some(text)) if text == "pong" => {}
                Ok(Some(text)) => match decode_event(&text) {
                    Ok(event) => {
                        debug!(kind = event.kind.name(), board = %event.board_id, "push event");
                        if self.tx.send(ChannelEvent::Event(event)).is_err() {
                            return "receiver dropped".to_string();
                        }
                    }
                    Err(e) => warn!(error = %e, "undecodable push message ignored"),
                },
                Ok(None) => {}
                Err(e) => return e.to_string(),
            }
        }
    }

    /// Sleep in short slices so `stop()` is not held up by the delay
    fn sleep(&self, total: Duration) {
        let deadline = Instant::now() + total;
        while !self.stopped() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(Duration::from_millis(20)));
        }
    }
}
