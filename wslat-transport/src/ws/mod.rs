//! WebSocket transport.
//!
//! Each connection is owned by one task that multiplexes queued outbound
//! frames with inbound reads, so callbacks for a connection never run
//! concurrently and see frames in arrival order.

pub mod client;
mod driver;
pub mod server;
pub mod tls;

pub use client::{WsClientConfig, WsConnector};
pub use server::{DEFAULT_PATH, Incoming, WsListener, WsServerConfig};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Connection, Connector, Frame, FrameHandler};
    use crate::error::TransportError;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Echo;

    impl FrameHandler for Echo {
        fn on_frame(&self, conn: &Connection, frame: &[u8]) {
            let _ = conn.send(Frame::Text(String::from_utf8_lossy(frame).into_owned()));
        }
    }

    #[derive(Default)]
    struct Recorder {
        frames: Mutex<Vec<String>>,
        closes: AtomicUsize,
    }

    impl FrameHandler for Recorder {
        fn on_frame(&self, _conn: &Connection, frame: &[u8]) {
            self.frames
                .lock()
                .push(String::from_utf8_lossy(frame).into_owned());
        }

        fn on_close(&self, _conn: &Connection) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn echo_server() -> (std::net::SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = WsListener::bind(WsServerConfig::new("127.0.0.1:0".parse().unwrap()))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            while let Ok(incoming) = listener.accept().await {
                tokio::spawn(async move {
                    let _ = incoming.upgrade(Arc::new(Echo)).await;
                });
            }
        });
        (addr, task)
    }

    async fn wait_for(mut cond: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_echo_round_trip() {
        let (addr, server) = echo_server().await;
        let recorder = Arc::new(Recorder::default());
        let conn = WsConnector::default()
            .connect(&format!("ws://{addr}/ws"), recorder.clone())
            .await
            .unwrap();
        assert_eq!(conn.peer_addr(), Some(addr));

        for i in 0..3 {
            conn.send_text(format!("msg-{i}")).unwrap();
        }
        wait_for(|| recorder.frames.lock().len() == 3).await;
        assert_eq!(
            recorder.frames.lock().as_slice(),
            &["msg-0".to_string(), "msg-1".to_string(), "msg-2".to_string()]
        );

        conn.close();
        wait_for(|| recorder.closes.load(Ordering::SeqCst) == 1).await;
        assert!(conn.send_text("late").is_err());
        server.abort();
    }

    #[tokio::test]
    async fn test_wrong_path_rejected() {
        let (addr, server) = echo_server().await;
        let result = WsConnector::default()
            .connect(&format!("ws://{addr}/other"), Arc::new(Recorder::default()))
            .await;
        assert!(matches!(result, Err(TransportError::WebSocket(_))));
        server.abort();
    }

    #[tokio::test]
    async fn test_server_close_fires_client_on_close() {
        let listener = WsListener::bind(WsServerConfig::new("127.0.0.1:0".parse().unwrap()))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let incoming = listener.accept().await.unwrap();
            let conn = incoming.upgrade(Arc::new(Echo)).await.unwrap();
            conn.close();
        });

        let recorder = Arc::new(Recorder::default());
        let conn = WsConnector::default()
            .connect(&format!("ws://{addr}/ws"), recorder.clone())
            .await
            .unwrap();
        wait_for(|| recorder.closes.load(Ordering::SeqCst) == 1).await;
        assert!(conn.is_closed());
        server.await.unwrap();
    }
}
