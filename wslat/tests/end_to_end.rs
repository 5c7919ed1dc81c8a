//! Client runs against a live server over loopback WebSocket.

use std::sync::Arc;
use std::time::Duration;
use wslat::prelude::*;
use wslat_server::{EchoResponder, ServerStats};
use wslat_transport::{WsListener, WsServerConfig};

async fn start_server(model: Model, rate: u32) -> (ServerHandle, String) {
    let (server, handle) = ServerBuilder::new()
        .bind("127.0.0.1:0".parse().unwrap())
        .model(model)
        .rate(rate)
        .payload_size(32)
        .build();
    tokio::spawn(async move { server.run().await });
    let addr = handle.bound_addr().await.expect("server did not bind");
    (handle, format!("ws://{addr}/ws"))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rtt_run_collects_samples() {
    let (server, url) = start_server(Model::RequestResponse, 10).await;

    let config = RunConfig::new(url)
        .model(Model::RequestResponse)
        .rate(10)
        .duration(Duration::from_secs(2))
        .warmup(5);
    let (run, handle) = RunBuilder::new(config).build();
    let report = run.run().await.unwrap();

    assert_eq!(handle.state(), RunState::Done);
    assert_eq!(report.reason, CompletionReason::DurationElapsed);
    let rtt = report.rtt.as_ref().unwrap();
    assert!(rtt.count >= 15, "only {} samples", rtt.count);
    assert!(rtt.min >= 0);
    assert!(rtt.min as f64 <= rtt.mean && rtt.mean <= rtt.max as f64);
    assert!(rtt.p50 <= rtt.p90 && rtt.p90 <= rtt.p99);
    assert_eq!(report.skipped, 5);
    assert_eq!(report.counters.parse_errors, 0);
    assert_eq!(report.counters.unmatched, 0);

    let table = SummaryTable(&report).to_string();
    assert!(table.contains("RTT LATENCY TEST RESULTS"));
    assert!(table.contains("Round-trip time"));

    server.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn push_run_collects_samples() {
    let (server, url) = start_server(Model::Push, 50).await;

    let config = RunConfig::new(url)
        .duration(Duration::from_secs(1))
        .warmup(5);
    let (run, _handle) = RunBuilder::new(config).build();
    let report = run.run().await.unwrap();

    assert_eq!(report.model, Model::Push);
    assert!(report.rtt.is_none());
    assert!(report.one_way.count >= 20, "only {} samples", report.one_way.count);
    assert!(report.one_way.min >= 0);
    assert!(report.generator.is_none());

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["model"], "push");
    assert_eq!(json["reason"], "duration_elapsed");
    assert!(json.get("rtt").is_none());

    server.shutdown();
}

/// Echoes every request but sends a malformed frame first.
struct NoisyEcho {
    echo: EchoResponder,
}

impl FrameHandler for NoisyEcho {
    fn on_frame(&self, conn: &Connection, frame: &[u8]) {
        let _ = conn.send_text("{not json");
        self.echo.respond(conn, frame);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn malformed_replies_are_counted_not_sampled() {
    let listener = WsListener::bind(WsServerConfig::new("127.0.0.1:0".parse().unwrap()))
        .await
        .unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());
    let handler: Arc<dyn FrameHandler> = Arc::new(NoisyEcho {
        echo: EchoResponder::new(EchoPayload::Verbatim, Arc::new(ServerStats::default())),
    });
    tokio::spawn(async move {
        let mut peers = Vec::new();
        while let Ok(incoming) = listener.accept().await {
            if let Ok(conn) = incoming.upgrade(Arc::clone(&handler)).await {
                peers.push(conn);
            }
        }
    });

    let config = RunConfig::new(url)
        .model(Model::RequestResponse)
        .rate(20)
        .duration(Duration::from_secs(1))
        .warmup(0);
    let (run, _handle) = RunBuilder::new(config).build();
    let report = run.run().await.unwrap();

    let rtt = report.rtt.unwrap();
    assert!(report.counters.parse_errors >= 10);
    assert!(report.counters.received >= report.counters.parse_errors + rtt.count as u64);
    assert!(rtt.count >= 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn continuous_run_stops_on_request() {
    let (server, url) = start_server(Model::RequestResponse, 10).await;

    let config = RunConfig::new(url)
        .model(Model::RequestResponse)
        .rate(100)
        .continuous(true)
        .warmup(0);
    let (run, handle) = RunBuilder::new(config).build();
    let task = tokio::spawn(run.run());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(handle.state(), RunState::Running);
    handle.stop();

    let report = task.await.unwrap().unwrap();
    assert_eq!(report.reason, CompletionReason::Stopped);
    let ticks = report.generator.unwrap().ticks;
    assert!((25..=75).contains(&ticks), "{ticks} ticks");
    assert!(report.rtt.unwrap().count > 0);

    server.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn early_stop_ends_run() {
    let (server, url) = start_server(Model::RequestResponse, 10).await;

    let config = RunConfig::new(url)
        .model(Model::RequestResponse)
        .rate(50)
        .duration(Duration::from_secs(20))
        .warmup(2)
        .early_stop_samples(Some(5));
    let (run, _handle) = RunBuilder::new(config).build();
    let report = run.run().await.unwrap();

    assert_eq!(report.reason, CompletionReason::EarlyStop);
    assert!(report.elapsed < Duration::from_secs(10));
    assert!(report.rtt.unwrap().count >= 5);

    server.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn wrong_path_fails_before_running() {
    let (server, url) = start_server(Model::Push, 10).await;
    let url = url.replace("/ws", "/other");

    let config = RunConfig::new(url).connect_timeout(Duration::from_secs(2));
    let (run, handle) = RunBuilder::new(config).build();
    let err = run.run().await.unwrap_err();

    assert!(matches!(err, ClientError::Connection(_)), "{err}");
    assert_eq!(handle.state(), RunState::Failed);
    assert_eq!(server.peer_count(), 0);

    server.shutdown();
}
