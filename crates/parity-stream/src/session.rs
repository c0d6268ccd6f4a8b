//! Subscription session lifecycle

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, instrument, trace, warn};

use crate::error::{StreamError, StreamResult};

/// Default bound on the WebSocket handshake
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long `close` waits for the receiver task before declaring it leaked
pub const CLOSE_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why the receiver task stopped
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReceiverExit {
    /// Told to stop by `close`, or the session went away
    Shutdown,
    /// The connection ended without being asked to
    Disconnected(String),
}

/// Lifecycle of a session: `Closed -> Opening -> Open -> Closing -> Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Opening,
    Open,
    Closing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Closed => write!(f, "closed"),
            SessionState::Opening => write!(f, "opening"),
            SessionState::Open => write!(f, "open"),
            SessionState::Closing => write!(f, "closing"),
        }
    }
}

/// One open duplex connection, its receiver task, and the frames it queued
pub struct Session {
    url: String,
    state: SessionState,
    writer: Option<SplitSink<WsStream, Message>>,
    /// Frames queued by the receiver, in transport order
    frames: mpsc::UnboundedReceiver<Value>,
    /// Frames taken off the queue but skipped by a predicate
    pending: VecDeque<Value>,
    /// Every frame taken off the queue, in transport order
    history: Vec<Value>,
    shutdown: Option<oneshot::Sender<()>>,
    receiver: Option<JoinHandle<ReceiverExit>>,
    /// Set once the receiver is seen to have stopped on its own
    disconnect: Option<String>,
}

impl Session {
    /// Connect to `url`, send `initial` if given, and start receiving
    #[instrument(skip(initial))]
    pub async fn open(
        url: &str,
        initial: Option<Value>,
        connect_timeout: Duration,
    ) -> StreamResult<Self> {
        let (ws_stream, _) = match timeout(connect_timeout, connect_async(url)).await {
            Ok(Ok(connected)) => connected,
            Ok(Err(source)) => {
                return Err(StreamError::Connect {
                    url: url.to_string(),
                    source,
                })
            }
            Err(_) => {
                return Err(StreamError::ConnectTimeout {
                    url: url.to_string(),
                    timeout: connect_timeout,
                })
            }
        };

        Self::from_stream(url, ws_stream, initial).await
    }

    /// Start a session on an already established WebSocket
    pub async fn from_stream(
        url: &str,
        ws_stream: WsStream,
        initial: Option<Value>,
    ) -> StreamResult<Self> {
        let (writer, reader) = ws_stream.split();
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let receiver = tokio::spawn(receive_frames(
            url.to_string(),
            reader,
            frames_tx,
            shutdown_rx,
        ));

        let mut session = Self {
            url: url.to_string(),
            state: SessionState::Opening,
            writer: Some(writer),
            frames: frames_rx,
            pending: VecDeque::new(),
            history: Vec::new(),
            shutdown: Some(shutdown_tx),
            receiver: Some(receiver),
            disconnect: None,
        };

        if let Some(payload) = initial {
            if let Err(e) = session.write(&payload).await {
                // Tear down the receiver before surfacing the error
                let _ = session.close().await;
                return Err(e);
            }
        }

        session.state = SessionState::Open;
        debug!(url = %session.url, "Session open");
        Ok(session)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the receiver task is still reading from the transport
    pub fn receiver_running(&self) -> bool {
        self.receiver
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Whether the connection has been seen to drop without `close`
    ///
    /// Updated when a drain reaches the end of the queue; `close` reports
    /// the same condition as [`StreamError::Disconnected`].
    pub fn disconnected(&self) -> bool {
        self.disconnect.is_some()
    }

    /// Send a command frame; replies arrive through the queue
    pub async fn send(&mut self, payload: impl Into<Value>) -> StreamResult<()> {
        if self.state != SessionState::Open {
            return Err(StreamError::NotOpen { state: self.state });
        }
        self.write(&payload.into()).await
    }

    async fn write(&mut self, payload: &Value) -> StreamResult<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or(StreamError::NotOpen { state: self.state })?;
        let text = serde_json::to_string(payload)?;
        trace!(url = %self.url, frame = %text, "Sending frame");
        writer
            .send(Message::Text(text))
            .await
            .map_err(StreamError::Send)
    }

    /// Wait up to `wait` for a frame matching `predicate`
    ///
    /// Frames that do not match are kept and offered to later calls, so
    /// an event arriving ahead of a response is not lost. Returns
    /// `Ok(None)` when the deadline passes and
    /// [`StreamError::Disconnected`] once the connection has dropped and
    /// nothing matching is left.
    pub async fn drain_until<P>(
        &mut self,
        mut predicate: P,
        wait: Duration,
    ) -> StreamResult<Option<Value>>
    where
        P: FnMut(&Value) -> bool,
    {
        if self.state != SessionState::Open {
            return Err(StreamError::NotOpen { state: self.state });
        }

        if let Some(pos) = self.pending.iter().position(&mut predicate) {
            return Ok(self.pending.remove(pos));
        }
        if let Some(reason) = &self.disconnect {
            return Err(self.disconnected_error(reason));
        }

        let deadline = Instant::now() + wait;
        loop {
            match timeout_at(deadline, self.frames.recv()).await {
                Ok(Some(frame)) => {
                    self.history.push(frame.clone());
                    if predicate(&frame) {
                        return Ok(Some(frame));
                    }
                    self.pending.push_back(frame);
                }
                Ok(None) => {
                    debug!(url = %self.url, "Receiver ended while draining");
                    self.reap_receiver().await?;
                    return Ok(None);
                }
                Err(_) => {
                    debug!(url = %self.url, ?wait, "No matching frame before deadline");
                    return Ok(None);
                }
            }
        }
    }

    /// Wait for the next frame whose `type` is `frame_type`
    pub async fn drain_type(
        &mut self,
        frame_type: &str,
        wait: Duration,
    ) -> StreamResult<Option<Value>> {
        self.drain_until(
            |frame| frame.get("type").and_then(Value::as_str) == Some(frame_type),
            wait,
        )
        .await
    }

    /// Wait for a `response` frame, optionally the one answering command `id`
    pub async fn drain_response(
        &mut self,
        id: Option<u64>,
        wait: Duration,
    ) -> StreamResult<Option<Value>> {
        self.drain_until(
            |frame| {
                frame.get("type").and_then(Value::as_str) == Some("response")
                    && id.map_or(true, |id| frame.get("id").and_then(Value::as_u64) == Some(id))
            },
            wait,
        )
        .await
    }

    /// Frames received so far, in arrival order, without waiting
    pub fn history(&mut self) -> &[Value] {
        self.collect_queued();
        &self.history
    }

    /// Stop the receiver, close the connection, and return every frame received
    ///
    /// Closing an already closed session is a no-op returning no frames.
    /// If the receiver does not stop within [`CLOSE_JOIN_TIMEOUT`] it is
    /// aborted and `ReceiverLeaked` is returned. If the connection dropped
    /// before `close` was called, `Disconnected` is returned. The session is
    /// closed either way, and on error the frames stay readable through
    /// [`Session::history`].
    pub async fn close(&mut self) -> StreamResult<Vec<Value>> {
        if self.state == SessionState::Closed {
            debug!(url = %self.url, "Session already closed");
            return Ok(Vec::new());
        }

        self.state = SessionState::Closing;
        debug!(url = %self.url, "Closing session");

        if let Some(shutdown) = self.shutdown.take() {
            // Err means the receiver already exited
            let _ = shutdown.send(());
        }

        if let Some(mut writer) = self.writer.take() {
            if let Ok(Err(e)) = timeout(CLOSE_JOIN_TIMEOUT, writer.close()).await {
                trace!(url = %self.url, error = %e, "Close frame not delivered");
            }
        }

        let joined = self.reap_receiver().await;

        self.collect_queued();
        self.pending.clear();
        self.state = SessionState::Closed;
        joined?;
        if let Some(reason) = &self.disconnect {
            return Err(self.disconnected_error(reason));
        }

        debug!(url = %self.url, frames = self.history.len(), "Session closed");
        Ok(std::mem::take(&mut self.history))
    }

    /// Join the receiver if it is still owned, recording an unrequested exit
    async fn reap_receiver(&mut self) -> StreamResult<()> {
        let Some(handle) = self.receiver.take() else {
            return Ok(());
        };

        match join_receiver(handle, CLOSE_JOIN_TIMEOUT).await? {
            ReceiverExit::Shutdown => Ok(()),
            ReceiverExit::Disconnected(reason) => {
                warn!(url = %self.url, reason = %reason, "Connection dropped");
                let err = self.disconnected_error(&reason);
                self.disconnect = Some(reason);
                Err(err)
            }
        }
    }

    fn disconnected_error(&self, reason: &str) -> StreamError {
        StreamError::Disconnected {
            url: self.url.clone(),
            reason: reason.to_string(),
        }
    }

    /// Move frames already queued into history and the pending buffer
    fn collect_queued(&mut self) {
        while let Ok(frame) = self.frames.try_recv() {
            self.history.push(frame.clone());
            self.pending.push_back(frame);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(handle) = self.receiver.take() {
            if !handle.is_finished() {
                warn!(url = %self.url, "Session dropped without close; aborting receiver");
            }
            handle.abort();
        }
    }
}

/// Receiver loop: queue every JSON frame until shutdown or end of stream
async fn receive_frames(
    url: String,
    mut reader: SplitStream<WsStream>,
    frames: mpsc::UnboundedSender<Value>,
    mut shutdown: oneshot::Receiver<()>,
) -> ReceiverExit {
    loop {
        tokio::select! {
            // Shutdown is sent before the close frame and must win over it
            biased;

            _ = &mut shutdown => {
                trace!(url = %url, "Receiver stopping");
                return ReceiverExit::Shutdown;
            }
            message = reader.next() => match message {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<Value>(&text) {
                    Ok(frame) => {
                        trace!(url = %url, frame = %text, "Received frame");
                        if frames.send(frame).is_err() {
                            return ReceiverExit::Shutdown;
                        }
                    }
                    Err(e) => warn!(url = %url, error = %e, "Skipping non-JSON frame"),
                },
                Some(Ok(Message::Close(close))) => {
                    debug!(url = %url, ?close, "Server closed the connection");
                    let reason = match close {
                        Some(frame) => format!(
                            "server sent close frame {} {}",
                            u16::from(frame.code),
                            frame.reason
                        ),
                        None => "server sent close frame".to_string(),
                    };
                    return ReceiverExit::Disconnected(reason);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(url = %url, error = %e, "Transport error; receiver stopping");
                    return ReceiverExit::Disconnected(e.to_string());
                }
                None => {
                    debug!(url = %url, "Stream ended");
                    return ReceiverExit::Disconnected(
                        "stream ended without a close frame".to_string(),
                    );
                }
            }
        }
    }
}

/// Join the receiver task, aborting it if it outlives `limit`
async fn join_receiver<T>(mut handle: JoinHandle<T>, limit: Duration) -> StreamResult<T> {
    match timeout(limit, &mut handle).await {
        Ok(Ok(exit)) => Ok(exit),
        Ok(Err(e)) => Err(StreamError::ReceiverFailed(e.to_string())),
        Err(_) => {
            handle.abort();
            Err(StreamError::ReceiverLeaked { timeout: limit })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_join_finished_receiver() {
        let handle = tokio::spawn(async {});
        assert!(join_receiver(handle, Duration::from_millis(500)).await.is_ok());
    }

    #[tokio::test]
    async fn test_join_stuck_receiver_is_leak() {
        let handle = tokio::spawn(std::future::pending::<()>());
        let abort = handle.abort_handle();

        let err = join_receiver(handle, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::ReceiverLeaked { .. }));

        // The stuck task is aborted, not left running
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(abort.is_finished());
    }

    #[tokio::test]
    async fn test_join_panicked_receiver() {
        let handle = tokio::spawn(async { panic!("receiver blew up") });
        let err = join_receiver(handle, Duration::from_millis(500))
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::ReceiverFailed(_)));
    }

    #[tokio::test]
    async fn test_open_unreachable_fails() {
        // Port 9 (discard) on localhost is closed in test environments
        let result = Session::open("ws://127.0.0.1:9/", None, Duration::from_secs(2)).await;
        assert!(matches!(
            result,
            Err(StreamError::Connect { .. }) | Err(StreamError::ConnectTimeout { .. })
        ));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Open.to_string(), "open");
        assert_eq!(
            StreamError::NotOpen {
                state: SessionState::Closed
            }
            .to_string(),
            "session is closed, not open"
        );
    }
}
