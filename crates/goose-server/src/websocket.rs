//! WebSocket-based live reload.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Messages queued per client before further broadcasts are dropped for it.
const CLIENT_QUEUE_CAPACITY: usize = 8;

/// How long a single client may take to accept a message.
const SEND_TIMEOUT: Duration = Duration::from_secs(2);

/// Messages pushed to live reload clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadMessage {
    /// Full page reload
    Reload,
}

impl ReloadMessage {
    /// Text frame sent over the socket.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReloadMessage::Reload => "reload",
        }
    }
}

/// Identifier of a connected client.
pub type ClientId = u64;

/// A registered client: its id and the queue the hub delivers into.
#[derive(Debug)]
pub struct ClientHandle {
    pub id: ClientId,
    pub messages: mpsc::Receiver<ReloadMessage>,
}

/// Registry of connected live reload clients.
///
/// Broadcasting only enqueues into per-client queues while the lock is held;
/// the socket writes happen in each client's own task, so a stalled browser
/// never holds up the others.
#[derive(Debug, Clone, Default)]
pub struct ReloadHub {
    inner: Arc<HubInner>,
}

#[derive(Debug, Default)]
struct HubInner {
    clients: Mutex<HashMap<ClientId, mpsc::Sender<ReloadMessage>>>,
    next_id: AtomicU64,
}

impl ReloadHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new client.
    pub fn connect(&self) -> ClientHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(CLIENT_QUEUE_CAPACITY);
        self.clients().insert(id, tx);

        ClientHandle { id, messages: rx }
    }

    /// Remove a client. Unknown ids are ignored.
    pub fn disconnect(&self, id: ClientId) {
        self.clients().remove(&id);
    }

    /// Queue `message` for every connected client.
    ///
    /// Returns how many clients it was queued for. Clients whose queue is
    /// full or closed are skipped.
    pub fn broadcast(&self, message: ReloadMessage) -> usize {
        let clients = self.clients();
        let mut delivered = 0;

        for (id, tx) in clients.iter() {
            match tx.try_send(message) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::debug!(client = id, "Client queue full, skipping");
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(client = id, "Client already gone, skipping");
                }
            }
        }

        delivered
    }

    /// Get the number of connected clients.
    pub fn client_count(&self) -> usize {
        self.clients().len()
    }

    /// Drive one WebSocket connection until it goes away.
    ///
    /// Reads from the socket only to notice the disconnect; incoming frames
    /// are otherwise ignored.
    pub async fn serve_client(&self, mut socket: WebSocket) {
        let ClientHandle { id, mut messages } = self.connect();
        tracing::debug!(client = id, "Live reload client connected");

        loop {
            tokio::select! {
                message = messages.recv() => {
                    let Some(message) = message else { break };
                    let frame = Message::Text(message.as_str().to_owned().into());

                    match tokio::time::timeout(SEND_TIMEOUT, socket.send(frame)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            tracing::debug!(client = id, "Send failed: {}", e);
                            break;
                        }
                        Err(_) => {
                            tracing::warn!(client = id, "Client stopped reading, dropping it");
                            break;
                        }
                    }
                }
                incoming = socket.recv() => match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(client = id, "Read failed: {}", e);
                        break;
                    }
                }
            }
        }

        self.disconnect(id);
        tracing::debug!(client = id, "Live reload client disconnected");
    }

    fn clients(&self) -> MutexGuard<'_, HashMap<ClientId, mpsc::Sender<ReloadMessage>>> {
        self.inner
            .clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Generate the client-side live reload script.
///
/// Connects to `path` on the serving host and reloads the page whenever a
/// `reload` message arrives.
pub fn reload_client_script(path: &str) -> String {
    format!(
        r#"
<script>
if ('WebSocket' in window) {{
  const ws = new WebSocket('ws://' + window.location.host + '{path}');

  ws.onmessage = (event) => {{
    if (event.data === '{reload}') {{
      console.log('Reloading page...');
      location.reload();
    }}
  }};
}}
</script>
"#,
        path = path,
        reload = ReloadMessage::Reload.as_str(),
    )
}
