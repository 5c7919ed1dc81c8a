//! In-process transport.
//!
//! Connects two handlers through channels inside one runtime. Behaves like
//! a socket pair: frames are delivered in order, and closing either end
//! closes both and fires both `on_close` callbacks.

use crate::connection::{Connection, Connector, Frame, FrameHandler};
use crate::error::TransportError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Creates a connected pair. Frames sent on the first handle reach
/// `second_handler`, and the other way round.
///
/// Must be called from within a tokio runtime.
#[must_use]
pub fn pair(
    first_id: u64,
    first_handler: Arc<dyn FrameHandler>,
    second_id: u64,
    second_handler: Arc<dyn FrameHandler>,
) -> (Connection, Connection) {
    let cancel = CancellationToken::new();
    let (first, first_rx) = Connection::new(first_id, None, cancel.clone());
    let (second, second_rx) = Connection::new(second_id, None, cancel);

    tokio::spawn(pump(
        first.clone(),
        first_rx,
        Arc::clone(&first_handler),
        second.clone(),
        Arc::clone(&second_handler),
    ));
    tokio::spawn(pump(
        second.clone(),
        second_rx,
        second_handler,
        first.clone(),
        first_handler,
    ));

    (first, second)
}

/// Delivers frames queued on `from` to the handler of `to`. Owns the
/// close callback of `from`.
async fn pump(
    from: Connection,
    mut rx: mpsc::UnboundedReceiver<Frame>,
    from_handler: Arc<dyn FrameHandler>,
    to: Connection,
    to_handler: Arc<dyn FrameHandler>,
) {
    let cancel = from.cancel_token();
    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            frame = rx.recv() => match frame {
                Some(frame) => to_handler.on_frame(&to, frame.as_bytes()),
                None => break,
            },
        }
    }
    from.mark_closed();
    from_handler.on_close(&from);
}

/// [`Connector`] whose server side is a handler in the same process.
///
/// Every connect creates a fresh [`pair`]; the server-side handles are kept
/// so callers can push to or drop individual clients.
pub struct MemoryConnector {
    server_handler: Arc<dyn FrameHandler>,
    peers: Mutex<Vec<Connection>>,
    next_id: AtomicU64,
}

impl MemoryConnector {
    /// Creates a connector whose accepted connections are served by
    /// `server_handler`.
    #[must_use]
    pub fn new(server_handler: Arc<dyn FrameHandler>) -> Self {
        Self {
            server_handler,
            peers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns the server-side handles of every connection made so far.
    #[must_use]
    pub fn peers(&self) -> Vec<Connection> {
        self.peers.lock().clone()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(
        &self,
        _url: &str,
        handler: Arc<dyn FrameHandler>,
    ) -> Result<Connection, TransportError> {
        let id = self.next_id.fetch_add(2, Ordering::Relaxed);
        let (client, server) = pair(id, handler, id + 1, Arc::clone(&self.server_handler));
        self.peers.lock().push(server);
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        frames: Mutex<Vec<Vec<u8>>>,
        closes: AtomicUsize,
    }

    impl FrameHandler for Recorder {
        fn on_frame(&self, _conn: &Connection, frame: &[u8]) {
            self.frames.lock().push(frame.to_vec());
        }

        fn on_close(&self, _conn: &Connection) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Echo;

    impl FrameHandler for Echo {
        fn on_frame(&self, conn: &Connection, frame: &[u8]) {
            let _ = conn.send(Frame::Binary(frame.to_vec()));
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_pair_delivers_in_order() {
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        let (first, second) = pair(1, a.clone(), 2, b.clone());

        for i in 0..5u8 {
            first.send(Frame::Binary(vec![i])).unwrap();
        }
        second.send_text("hi").unwrap();
        settle().await;

        let got: Vec<u8> = b.frames.lock().iter().map(|f| f[0]).collect();
        assert_eq!(got, vec![0, 1, 2, 3, 4]);
        assert_eq!(a.frames.lock().as_slice(), &[b"hi".to_vec()]);
    }

    #[tokio::test]
    async fn test_close_either_end_closes_both() {
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        let (first, second) = pair(1, a.clone(), 2, b.clone());

        second.close();
        settle().await;

        assert!(first.is_closed());
        assert!(second.is_closed());
        assert_eq!(a.closes.load(Ordering::SeqCst), 1);
        assert_eq!(b.closes.load(Ordering::SeqCst), 1);
        assert!(first.send_text("late").is_err());
    }

    #[tokio::test]
    async fn test_connector_echo() {
        let connector = MemoryConnector::new(Arc::new(Echo));
        let client = Arc::new(Recorder::default());
        let conn = connector
            .connect("ws://ignored/ws", client.clone())
            .await
            .unwrap();

        conn.send_text("ping").unwrap();
        tokio::time::timeout(Duration::from_secs(1), async {
            while client.frames.lock().is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        assert_eq!(client.frames.lock()[0], b"ping".to_vec());
        assert_eq!(connector.peers().len(), 1);
        assert_ne!(connector.peers()[0].id(), conn.id());
    }
}
