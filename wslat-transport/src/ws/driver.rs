//! Per-connection WebSocket task.

use crate::connection::{Connection, Frame, FrameHandler};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => Message::Text(text),
            Frame::Binary(bytes) => Message::Binary(bytes),
        }
    }
}

/// Spawns the task that owns `ws`: it writes queued frames, hands inbound
/// application frames to `handler`, and fires `on_close` when done.
pub(crate) fn spawn<S>(
    ws: WebSocketStream<S>,
    conn: Connection,
    rx: mpsc::UnboundedReceiver<Frame>,
    handler: Arc<dyn FrameHandler>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        drive(ws, &conn, rx, handler.as_ref()).await;
        conn.mark_closed();
        handler.on_close(&conn);
    });
}

async fn drive<S>(
    ws: WebSocketStream<S>,
    conn: &Connection,
    mut rx: mpsc::UnboundedReceiver<Frame>,
    handler: &dyn FrameHandler,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut sink, mut stream) = ws.split();
    let cancel = conn.cancel_token();
    let id = conn.id();

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                if let Err(e) = sink.close().await {
                    tracing::debug!("Connection {} close handshake failed: {}", id, e);
                }
                return;
            }

            Some(frame) = rx.recv() => {
                if let Err(e) = sink.send(Message::from(frame)).await {
                    tracing::warn!("Connection {} write error: {}", id, e);
                    return;
                }
            }

            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => handler.on_frame(conn, text.as_bytes()),
                Some(Ok(Message::Binary(bytes))) => handler.on_frame(conn, &bytes),
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!("Connection {} closed by peer: {:?}", id, frame);
                    return;
                }
                // Pings are answered by tungstenite on the next write.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!("Connection {} read error: {}", id, e);
                    return;
                }
                None => {
                    tracing::debug!("Connection {} stream ended", id);
                    return;
                }
            },
        }
    }
}
