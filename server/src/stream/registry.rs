//! Registry of live push-stream connections.
//!
//! Each connection is a bounded mpsc channel; the receiving half is
//! handed to the client as an SSE stream, the sending half stays here.
//! Every write races a fixed deadline so a stalled consumer can never
//! stall the rest of the system — exceeding it tears down that one
//! connection only.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use dashmap::DashMap;
use futures_util::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use super::events::{LogFrame, LoginFrame};

/// Tunables for the stream registry.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Upper bound on any single write to a connection.
    pub write_timeout: Duration,
    /// Interval between heartbeat frames on a login channel.
    pub heartbeat_interval: Duration,
    /// Heartbeats written before the connection is timed out.
    pub heartbeat_max_ticks: u32,
    /// Queue depth per connection.
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_millis(500),
            heartbeat_interval: Duration::from_secs(10),
            heartbeat_max_ticks: 30,
            channel_capacity: 32,
        }
    }
}

/// Outcome of pushing a login success frame to a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// Success and closing frames delivered, connection closed.
    Delivered,
    /// No live connection for the ticket.
    Expired,
    /// The write failed; the connection was torn down.
    Failed(String),
}

/// Why a write to a connection did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteError {
    Timeout,
    Closed,
}

impl std::fmt::Display for WriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteError::Timeout => write!(f, "write timed out"),
            WriteError::Closed => write!(f, "connection closed"),
        }
    }
}

pub(crate) struct LoginConn {
    pub(crate) tx: mpsc::Sender<LoginFrame>,
    /// Heartbeat supervisor; aborted when the connection is removed.
    pub(crate) heartbeat: Option<JoinHandle<()>>,
}

pub(crate) struct LogConn {
    pub(crate) tx: mpsc::Sender<LogFrame>,
}

/// Registry of login-handshake channels and admin log channels.
pub struct StreamRegistry {
    pub(crate) cfg: StreamConfig,
    pub(crate) logins: DashMap<String, LoginConn>,
    pub(crate) log_clients: DashMap<String, LogConn>,
}

impl StreamRegistry {
    pub fn new(cfg: StreamConfig) -> Arc<Self> {
        Arc::new(Self {
            cfg,
            logins: DashMap::new(),
            log_clients: DashMap::new(),
        })
    }

    /// Remove a login connection and stop its heartbeat supervisor.
    /// Idempotent — every teardown path funnels through here.
    pub(crate) fn remove_login(&self, ticket: &str) -> bool {
        if let Some((_, conn)) = self.logins.remove(ticket) {
            if let Some(handle) = conn.heartbeat {
                handle.abort();
            }
            tracing::debug!(ticket = %ticket, "login channel removed");
            true
        } else {
            false
        }
    }

    /// Remove an admin log listener. Idempotent.
    pub(crate) fn remove_log_client(&self, client_id: &str) -> bool {
        if self.log_clients.remove(client_id).is_some() {
            tracing::debug!(client_id = %client_id, "log channel removed");
            true
        } else {
            false
        }
    }

    /// Write one frame to a login connection within the configured
    /// deadline. On timeout or write failure the connection is torn
    /// down, with a best-effort closing notice.
    pub(crate) async fn write_login(
        &self,
        ticket: &str,
        frame: LoginFrame,
    ) -> Result<(), WriteError> {
        // Clone the sender out so no map guard is held across the await.
        let Some(tx) = self.logins.get(ticket).map(|c| c.tx.clone()) else {
            return Err(WriteError::Closed);
        };

        match send_with_deadline(&tx, frame, self.cfg.write_timeout).await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::warn!(ticket = %ticket, error = %err, "login channel write failed");
                let _ = tx.try_send(LoginFrame::closing());
                self.remove_login(ticket);
                Err(err)
            }
        }
    }

    /// Number of live login connections (for tests and the stats surface).
    pub fn login_count(&self) -> usize {
        self.logins.len()
    }

    /// Number of live admin log listeners.
    pub fn log_client_count(&self) -> usize {
        self.log_clients.len()
    }
}

/// Race a channel send against a fixed deadline.
pub(crate) async fn send_with_deadline<T>(
    tx: &mpsc::Sender<T>,
    frame: T,
    deadline: Duration,
) -> Result<(), WriteError> {
    match tokio::time::timeout(deadline, tx.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(_)) => Err(WriteError::Closed),
        Err(_) => Err(WriteError::Timeout),
    }
}

pub(crate) enum ChannelKey {
    Login(String),
    Log(String),
}

/// A receiver stream that detaches its registry entry when dropped.
/// Dropping is the client-abort path: axum drops the SSE body stream
/// as soon as the client disconnects.
pub struct ChannelStream<T> {
    pub(crate) inner: ReceiverStream<T>,
    pub(crate) registry: Arc<StreamRegistry>,
    pub(crate) key: ChannelKey,
}

impl<T> Stream for ChannelStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }
}

impl<T> Drop for ChannelStream<T> {
    fn drop(&mut self) {
        match &self.key {
            ChannelKey::Login(ticket) => {
                self.registry.remove_login(ticket);
            }
            ChannelKey::Log(client_id) => {
                self.registry.remove_log_client(client_id);
            }
        }
    }
}
