//! Admin log channels: live feed of every record the store writes.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use super::events::LogFrame;
use super::registry::{send_with_deadline, ChannelKey, ChannelStream, LogConn, StreamRegistry};

impl StreamRegistry {
    /// Register an admin log listener. No heartbeat — the browser's
    /// EventSource reconnects on its own, and broadcast failures evict
    /// dead listeners.
    pub fn open_log_channel(self: &Arc<Self>) -> (String, ChannelStream<LogFrame>) {
        let client_id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(self.cfg.channel_capacity);

        // The channel is freshly created, so the acknowledgement cannot
        // fail for capacity.
        let _ = tx.try_send(LogFrame::Connected {
            client_id: client_id.clone(),
        });

        self.log_clients
            .insert(client_id.clone(), LogConn { tx });

        tracing::debug!(client_id = %client_id, "log channel opened");

        let stream = ChannelStream {
            inner: ReceiverStream::new(rx),
            registry: Arc::clone(self),
            key: ChannelKey::Log(client_id.clone()),
        };
        (client_id, stream)
    }

    /// Best-effort fan-out to every registered log listener. Failures
    /// are isolated per listener: a slow or dead consumer is removed
    /// without affecting delivery to the others.
    pub async fn broadcast(&self, frame: LogFrame) {
        // Snapshot the senders so no map guard is held across an await.
        let listeners: Vec<(String, mpsc::Sender<LogFrame>)> = self
            .log_clients
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().tx.clone()))
            .collect();

        for (client_id, tx) in listeners {
            if let Err(err) =
                send_with_deadline(&tx, frame.clone(), self.cfg.write_timeout).await
            {
                tracing::debug!(client_id = %client_id, error = %err, "evicting log listener");
                self.remove_log_client(&client_id);
            }
        }
    }
}
