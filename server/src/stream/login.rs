//! Login handshake channels ("scan to login").
//!
//! A client opens a channel, receives a ticket in the ready frame, and
//! renders it as a QR code. When the scan is confirmed elsewhere,
//! `push_login_success` delivers the uid and closes the channel. A
//! per-connection heartbeat supervisor bounds the lifetime of channels
//! whose client never completes the handshake.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use super::events::LoginFrame;
use super::registry::{ChannelKey, ChannelStream, LoginConn, PushOutcome, StreamRegistry};

impl StreamRegistry {
    /// Allocate a ticket, register the connection, and start its
    /// heartbeat supervisor. The ready frame carrying the ticket is
    /// pushed on the next scheduling tick, after the caller has had a
    /// chance to hand the stream to the transport.
    pub fn open_login_channel(self: &Arc<Self>) -> (String, ChannelStream<LoginFrame>) {
        let ticket = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(self.cfg.channel_capacity);

        self.logins.insert(
            ticket.clone(),
            LoginConn {
                tx,
                heartbeat: None,
            },
        );

        let heartbeat = tokio::spawn(heartbeat_supervisor(Arc::clone(self), ticket.clone()));
        match self.logins.get_mut(&ticket) {
            Some(mut conn) => conn.heartbeat = Some(heartbeat),
            // Client aborted before we got here; nothing left to supervise.
            None => heartbeat.abort(),
        }

        let registry = Arc::clone(self);
        let ready_ticket = ticket.clone();
        tokio::spawn(async move {
            let frame = LoginFrame::ready(&ready_ticket);
            let _ = registry.write_login(&ready_ticket, frame).await;
        });

        tracing::debug!(ticket = %ticket, "login channel opened");

        let stream = ChannelStream {
            inner: ReceiverStream::new(rx),
            registry: Arc::clone(self),
            key: ChannelKey::Login(ticket.clone()),
        };
        (ticket, stream)
    }

    /// Deliver a one-time success frame to a waiting login channel,
    /// then close it with a closing notice.
    pub async fn push_login_success(&self, ticket: &str, uid: &str) -> PushOutcome {
        let Some(tx) = self.logins.get(ticket).map(|c| c.tx.clone()) else {
            return PushOutcome::Expired;
        };

        match super::registry::send_with_deadline(
            &tx,
            LoginFrame::success(uid),
            self.cfg.write_timeout,
        )
        .await
        {
            Ok(()) => {
                // Best effort — the client may already be gone.
                let _ = super::registry::send_with_deadline(
                    &tx,
                    LoginFrame::closing(),
                    self.cfg.write_timeout,
                )
                .await;
                self.remove_login(ticket);
                tracing::info!(ticket = %ticket, uid = %uid, "login success delivered");
                PushOutcome::Delivered
            }
            Err(err) => {
                self.remove_login(ticket);
                tracing::warn!(ticket = %ticket, error = %err, "login success write failed");
                PushOutcome::Failed(err.to_string())
            }
        }
    }
}

/// Per-connection heartbeat loop: an incrementing counter frame every
/// interval, then a single terminal timeout frame once the tick budget
/// is exhausted. The task holds only the ticket and re-checks registry
/// membership before every write — the connection may have been removed
/// by a success push or client abort while this task slept.
async fn heartbeat_supervisor(registry: Arc<StreamRegistry>, ticket: String) {
    let mut ticker = tokio::time::interval(registry.cfg.heartbeat_interval);
    // The first tick completes immediately; skip it.
    ticker.tick().await;

    for tick in 1..=registry.cfg.heartbeat_max_ticks {
        ticker.tick().await;

        if !registry.logins.contains_key(&ticket) {
            return;
        }
        if registry
            .write_login(&ticket, LoginFrame::heartbeat(tick))
            .await
            .is_err()
        {
            // write_login already tore the connection down.
            return;
        }
    }

    tracing::info!(ticket = %ticket, "login channel heartbeat exhausted");
    let _ = registry.write_login(&ticket, LoginFrame::timeout()).await;
    registry.remove_login(&ticket);
}
