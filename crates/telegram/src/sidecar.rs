//! WebSocket link to the MTProto sidecar.

use std::{collections::HashMap, sync::Arc, time::Duration};

use {
    futures::{SinkExt, StreamExt},
    tokio::sync::{Mutex, RwLock, mpsc, oneshot},
    tokio_tungstenite::{connect_async, tungstenite::Message},
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
    uuid::Uuid,
};

use clockname_sessions::SessionError;

use crate::types::{GatewayMessage, SidecarMessage, SidecarReply};

pub const DEFAULT_SIDECAR_URL: &str = "ws://127.0.0.1:9877";

/// How long a request may wait for its reply.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<SidecarReply>>>>;

/// One WebSocket connection with request/reply correlation.
pub struct SidecarLink {
    tx: mpsc::Sender<GatewayMessage>,
    pending: Pending,
    connected: Arc<RwLock<bool>>,
    close: CancellationToken,
    request_timeout: Duration,
}

impl SidecarLink {
    /// Connect to `url` and spawn the reader and writer tasks.
    pub async fn open(url: &str, request_timeout: Duration) -> Result<Self, SessionError> {
        debug!(url, "connecting to sidecar");
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| SessionError::Connect(format!("{url}: {e}")))?;
        let (mut write, mut read) = ws_stream.split();

        let (tx, mut rx) = mpsc::channel::<GatewayMessage>(32);
        let pending: Pending = Arc::default();
        let connected = Arc::new(RwLock::new(true));
        let close = CancellationToken::new();

        let pending_reader = Arc::clone(&pending);
        let connected_reader = Arc::clone(&connected);
        tokio::spawn(async move {
            while let Some(msg_result) = read.next().await {
                match msg_result {
                    Ok(Message::Text(text)) => match serde_json::from_str::<SidecarMessage>(&text) {
                        Ok(SidecarMessage::Response(reply)) => {
                            let waiter = pending_reader.lock().await.remove(&reply.request_id);
                            match waiter {
                                Some(waiter) => {
                                    let _ = waiter.send(reply);
                                },
                                None => {
                                    debug!(request_id = %reply.request_id, "reply for unknown or expired request");
                                },
                            }
                        },
                        Ok(SidecarMessage::Error { account_id, error }) => {
                            warn!(account_id = ?account_id, error = %error, "sidecar reported an error");
                        },
                        Err(e) => {
                            warn!(error = %e, text = %text, "failed to parse sidecar message");
                        },
                    },
                    Ok(Message::Close(_)) => {
                        debug!("sidecar connection closed");
                        break;
                    },
                    Ok(_) => {},
                    Err(e) => {
                        error!(error = %e, "sidecar read error");
                        break;
                    },
                }
            }

            *connected_reader.write().await = false;
            // Dropping the senders wakes every waiter with `Closed`.
            pending_reader.lock().await.clear();
        });

        let connected_writer = Arc::clone(&connected);
        let close_writer = close.clone();
        tokio::spawn(async move {
            loop {
                let msg = tokio::select! {
                    biased;
                    _ = close_writer.cancelled() => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    },
                    msg = rx.recv() => match msg {
                        Some(msg) => msg,
                        None => break,
                    },
                };
                match serde_json::to_string(&msg) {
                    Ok(json) => {
                        if let Err(e) = write.send(Message::Text(json.into())).await {
                            error!(error = %e, "failed to send message to sidecar");
                            break;
                        }
                    },
                    Err(e) => {
                        error!(error = %e, "failed to serialize message");
                    },
                }
            }

            *connected_writer.write().await = false;
        });

        info!(url, "connected to sidecar");
        Ok(Self {
            tx,
            pending,
            connected,
            close,
            request_timeout,
        })
    }

    pub async fn is_connected(&self) -> bool {
        *self.connected.read().await
    }

    /// Send the message built from a fresh request id and wait for its reply.
    ///
    /// Negative replies become [`SessionError::Rejected`].
    pub async fn request(
        &self,
        build: impl FnOnce(String) -> GatewayMessage,
    ) -> Result<SidecarReply, SessionError> {
        if !self.is_connected().await {
            return Err(SessionError::Closed);
        }

        let request_id = Uuid::new_v4().to_string();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending
            .lock()
            .await
            .insert(request_id.clone(), reply_tx);

        if self.tx.send(build(request_id.clone())).await.is_err() {
            self.pending.lock().await.remove(&request_id);
            return Err(SessionError::Closed);
        }

        match tokio::time::timeout(self.request_timeout, reply_rx).await {
            Ok(Ok(reply)) => reply.into_result(),
            Ok(Err(_)) => Err(SessionError::Closed),
            Err(_) => {
                self.pending.lock().await.remove(&request_id);
                Err(SessionError::Timeout)
            },
        }
    }

    /// Close the socket. Pending and later requests fail with `Closed`.
    pub fn close(&self) {
        self.close.cancel();
    }
}

impl Drop for SidecarLink {
    fn drop(&mut self) {
        self.close.cancel();
    }
}
