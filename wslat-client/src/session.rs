//! Per-run measurement state and the inbound/outbound message paths.
//!
//! Everything here runs on the connection task or the generator task and
//! must stay non-blocking: stamp, parse, feed an aggregator, maybe enqueue.

use crate::report::RunCounters;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use wslat_core::clock;
use wslat_core::{
    CompletionReason, CompletionSignal, GenerationError, LatencyAggregator, Model, PushEvent,
    RttMessage, TickAction,
};
use wslat_transport::{Connection, FrameHandler};

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    /// Built, not started.
    Idle,
    /// Waiting for the transport to become ready.
    Connecting,
    /// Measuring.
    Running,
    /// Stopping generation and closing the connection.
    Completing,
    /// Report produced.
    Done,
    /// Ended with a fatal error before `Running`.
    Failed,
}

/// State shared by the coordinator, its handle and the message paths.
pub(crate) struct RunContext {
    pub(crate) run_id: String,
    pub(crate) model: Model,
    pub(crate) state: Mutex<RunState>,
    pub(crate) signal: CompletionSignal,
    pub(crate) counters: RunCounters,
    pub(crate) one_way: LatencyAggregator,
    pub(crate) rtt: LatencyAggregator,
    pub(crate) processing: LatencyAggregator,
    early_stop: Option<u64>,
}

impl RunContext {
    pub(crate) fn new(model: Model, warmup: u64, early_stop: Option<u64>) -> Self {
        Self {
            run_id: format!("{:x}", clock::now_nanos()),
            model,
            state: Mutex::new(RunState::Idle),
            signal: CompletionSignal::new(),
            counters: RunCounters::default(),
            one_way: LatencyAggregator::new(warmup),
            rtt: LatencyAggregator::new(warmup),
            processing: LatencyAggregator::new(warmup),
            early_stop,
        }
    }

    pub(crate) fn state(&self) -> RunState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: RunState) {
        let mut current = self.state.lock();
        tracing::debug!("Run {} {:?} -> {:?}", self.run_id, *current, state);
        *current = state;
    }

    /// The aggregator the run is named after.
    pub(crate) fn primary(&self) -> &LatencyAggregator {
        match self.model {
            Model::Push => &self.one_way,
            Model::RequestResponse => &self.rtt,
        }
    }

    fn check_early_stop(&self) {
        if let Some(threshold) = self.early_stop
            && self.primary().sample_count() as u64 >= threshold
            && self.signal.trigger(CompletionReason::EarlyStop)
        {
            tracing::info!("Run {} reached {} samples, stopping early", self.run_id, threshold);
        }
    }

    fn transport_closed(&self) {
        if self.signal.trigger(CompletionReason::TransportClosed) {
            tracing::warn!("Run {} connection closed by transport", self.run_id);
        }
    }
}

/// Receives server-push events.
pub(crate) struct PushReceiver {
    ctx: Arc<RunContext>,
}

impl PushReceiver {
    pub(crate) fn new(ctx: Arc<RunContext>) -> Self {
        Self { ctx }
    }
}

impl FrameHandler for PushReceiver {
    fn on_frame(&self, _conn: &Connection, frame: &[u8]) {
        let recv_ts = clock::now_nanos();
        let ctx = &self.ctx;
        RunCounters::incr(&ctx.counters.received);

        let mut event = match PushEvent::decode(frame) {
            Ok(event) => event,
            Err(e) => {
                RunCounters::incr(&ctx.counters.parse_errors);
                tracing::warn!("Discarding event: {}", e);
                return;
            }
        };
        if let Err(e) = event.stamp_client_recv(recv_ts) {
            RunCounters::incr(&ctx.counters.parse_errors);
            tracing::warn!("Discarding event {}: {}", event.sequence(), e);
            return;
        }

        let latency = match event.one_way_latency() {
            Ok(latency) => latency,
            Err(e) => {
                RunCounters::incr(&ctx.counters.parse_errors);
                tracing::warn!("Discarding event {}: {}", event.sequence(), e);
                return;
            }
        };
        if let Some(latency) = latency
            && ctx.one_way.add_sample(latency)
        {
            ctx.check_early_stop();
        }
    }

    fn on_close(&self, _conn: &Connection) {
        self.ctx.transport_closed();
    }
}

/// Receives echoed request-response messages.
pub(crate) struct RttReceiver {
    ctx: Arc<RunContext>,
    id_prefix: String,
}

impl RttReceiver {
    pub(crate) fn new(ctx: Arc<RunContext>) -> Self {
        let id_prefix = format!("{}-", ctx.run_id);
        Self { ctx, id_prefix }
    }
}

impl FrameHandler for RttReceiver {
    fn on_frame(&self, _conn: &Connection, frame: &[u8]) {
        let recv_ts = clock::now_nanos();
        let ctx = &self.ctx;
        RunCounters::incr(&ctx.counters.received);

        let mut reply = match RttMessage::decode(frame) {
            Ok(reply) => reply,
            Err(e) => {
                RunCounters::incr(&ctx.counters.parse_errors);
                tracing::warn!("Discarding reply: {}", e);
                return;
            }
        };
        if let Some(id) = reply.message_id()
            && !id.starts_with(&self.id_prefix)
        {
            RunCounters::incr(&ctx.counters.unmatched);
            tracing::debug!("Discarding reply {} from another run", id);
            return;
        }
        if let Err(e) = reply.stamp_client_recv(recv_ts) {
            RunCounters::incr(&ctx.counters.parse_errors);
            tracing::warn!("Discarding reply {}: {}", reply.sequence(), e);
            return;
        }

        // Derive every interval first so a bad reply feeds no aggregator.
        let intervals = reply.rtt().and_then(|rtt| {
            Ok((rtt, reply.one_way_latency()?, reply.server_processing()?))
        });
        let (rtt, one_way, processing) = match intervals {
            Ok(intervals) => intervals,
            Err(e) => {
                RunCounters::incr(&ctx.counters.parse_errors);
                tracing::warn!("Discarding reply {}: {}", reply.sequence(), e);
                return;
            }
        };

        if let Some(rtt) = rtt {
            if rtt < 0 {
                tracing::error!("Negative RTT {} ns for sequence {}", rtt, reply.sequence());
            }
            if ctx.rtt.add_sample(rtt) {
                ctx.check_early_stop();
            }
        }
        if let Some(one_way) = one_way {
            ctx.one_way.add_sample(one_way);
        }
        if let Some(processing) = processing {
            ctx.processing.add_sample(processing);
        }
    }

    fn on_close(&self, _conn: &Connection) {
        self.ctx.transport_closed();
    }
}

/// Issues one request per generator tick.
pub(crate) struct Requester {
    ctx: Arc<RunContext>,
    conn: Connection,
    payload: String,
    next_sequence: AtomicU64,
}

impl Requester {
    pub(crate) fn new(ctx: Arc<RunContext>, conn: Connection, payload: String) -> Self {
        Self {
            ctx,
            conn,
            payload,
            next_sequence: AtomicU64::new(1),
        }
    }
}

impl TickAction for Requester {
    fn on_tick(&self, _tick: u64) -> Result<(), GenerationError> {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let message_id = format!("{}-{}", self.ctx.run_id, sequence);
        let request = RttMessage::new(sequence, self.payload.clone(), clock::now_nanos())
            .with_message_id(message_id);

        self.conn.send_text(request.encode()?).map_err(|e| {
            RunCounters::incr(&self.ctx.counters.send_errors);
            GenerationError::send_rejected(e.to_string())
        })?;
        RunCounters::incr(&self.ctx.counters.sent);
        Ok(())
    }
}
