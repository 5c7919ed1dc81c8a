//! Run coordinator.
//!
//! A run moves through `Idle -> Connecting -> Running -> Completing -> Done`.
//! Connecting is bounded by the connect timeout and any failure there is
//! fatal. Once running, the first completion trigger wins: duration elapsed,
//! an external stop, the early-stop threshold, or the transport closing.
//! Completion always produces a report from whatever samples were retained.

use crate::error::ClientError;
use crate::report::{CountersSnapshot, RunReport};
use crate::session::{PushReceiver, Requester, RttReceiver, RunContext, RunState};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use wslat_core::protocol;
use wslat_core::{CompletionReason, Generator, GeneratorSnapshot, Model, RunConfig};
use wslat_transport::{Connector, FrameHandler, WsClientConfig, WsConnector};

/// Builder for a single measurement run.
pub struct RunBuilder {
    config: RunConfig,
    connector: Option<Arc<dyn Connector>>,
}

impl RunBuilder {
    /// Creates a run builder for `config`.
    #[must_use]
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            connector: None,
        }
    }

    /// Sets the transport connector. Defaults to a [`WsConnector`] honouring
    /// the config's connect timeout and insecure flag.
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Builds the coordinator and its handle.
    #[must_use]
    pub fn build(self) -> (RunCoordinator, RunHandle) {
        let connector = self.connector.unwrap_or_else(|| {
            Arc::new(WsConnector::new(
                WsClientConfig::default()
                    .connect_timeout(self.config.connect_timeout)
                    .insecure(self.config.insecure),
            ))
        });
        let ctx = Arc::new(RunContext::new(
            self.config.model,
            self.config.warmup,
            self.config.early_stop_samples,
        ));

        let coordinator = RunCoordinator {
            config: self.config,
            connector,
            ctx: Arc::clone(&ctx),
        };
        (coordinator, RunHandle { ctx })
    }
}

/// Drives one run to completion.
pub struct RunCoordinator {
    config: RunConfig,
    connector: Arc<dyn Connector>,
    ctx: Arc<RunContext>,
}

impl RunCoordinator {
    /// Runs the measurement.
    ///
    /// # Errors
    /// Returns `ClientError` if the configuration is invalid or the
    /// connection cannot be established in time. Errors after the run
    /// reaches `Running` are counted, never returned.
    pub async fn run(self) -> Result<RunReport, ClientError> {
        let ctx = Arc::clone(&self.ctx);
        let config = &self.config;

        if let Err(e) = config.validate() {
            return Err(self.fail(e.into()));
        }
        let rate = config.nonzero_rate()?;
        let started_at = Utc::now();

        ctx.set_state(RunState::Connecting);
        tracing::info!(
            "Run {} connecting to {} ({} model)",
            ctx.run_id,
            config.url,
            config.model
        );

        let handler: Arc<dyn FrameHandler> = match config.model {
            Model::Push => Arc::new(PushReceiver::new(Arc::clone(&ctx))),
            Model::RequestResponse => Arc::new(RttReceiver::new(Arc::clone(&ctx))),
        };
        let connect = tokio::time::timeout(
            config.connect_timeout,
            self.connector.connect(&config.url, handler),
        );

        let conn = tokio::select! {
            biased;

            reason = ctx.signal.wait() => {
                tracing::info!("Run {} ended while connecting: {}", ctx.run_id, reason);
                return Ok(self.complete(reason, started_at, Duration::ZERO, None));
            }

            result = connect => match result {
                Ok(Ok(conn)) => conn,
                Ok(Err(e)) => return Err(self.fail(e.into())),
                Err(_) => return Err(self.fail(ClientError::ConnectTimeout)),
            },
        };

        ctx.set_state(RunState::Running);
        let running_since = Instant::now();
        tracing::info!("Run {} running at {} msg/s", ctx.run_id, rate);

        let generator = match config.model {
            Model::RequestResponse => Some(Generator::start(
                rate,
                Requester::new(
                    Arc::clone(&ctx),
                    conn.clone(),
                    protocol::payload(config.payload_size),
                ),
            )),
            Model::Push => None,
        };
        let progress = config
            .progress_interval
            .filter(|every| !every.is_zero())
            .map(|every| tokio::spawn(log_progress(Arc::clone(&ctx), every)));

        let reason = if config.continuous {
            ctx.signal.wait().await
        } else {
            match ctx.signal.wait_timeout(config.duration).await {
                Some(reason) => reason,
                None => {
                    ctx.signal.trigger(CompletionReason::DurationElapsed);
                    ctx.signal
                        .reason()
                        .unwrap_or(CompletionReason::DurationElapsed)
                }
            }
        };

        ctx.set_state(RunState::Completing);
        tracing::info!("Run {} completing: {}", ctx.run_id, reason);

        let generated = match &generator {
            Some(generator) => {
                generator.stop(config.stop_grace).await;
                Some(generator.snapshot())
            }
            None => None,
        };
        conn.close();
        if let Some(task) = progress {
            task.abort();
        }

        let report = self.complete(reason, started_at, running_since.elapsed(), generated);
        tracing::info!(
            "Run {} done: {} samples, {} skipped",
            report.run_id,
            report.primary().count,
            report.skipped
        );
        Ok(report)
    }

    fn fail(&self, err: ClientError) -> ClientError {
        tracing::error!("Run {} failed: {}", self.ctx.run_id, err);
        self.ctx.set_state(RunState::Failed);
        err
    }

    fn complete(
        &self,
        reason: CompletionReason,
        started_at: chrono::DateTime<Utc>,
        elapsed: Duration,
        generator: Option<GeneratorSnapshot>,
    ) -> RunReport {
        let ctx = &self.ctx;
        let rtt_model = ctx.model == Model::RequestResponse;
        let report = RunReport {
            run_id: ctx.run_id.clone(),
            model: ctx.model,
            reason,
            started_at,
            elapsed,
            warmup: self.config.warmup,
            skipped: ctx.primary().skipped_count(),
            one_way: ctx.one_way.summarize(),
            rtt: rtt_model.then(|| ctx.rtt.summarize()),
            server_processing: rtt_model.then(|| ctx.processing.summarize()),
            counters: ctx.counters.snapshot(),
            generator,
        };
        ctx.set_state(RunState::Done);
        report
    }
}

async fn log_progress(ctx: Arc<RunContext>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let counters = ctx.counters.snapshot();
        tracing::info!(
            "Run {}: {} samples, {} skipped, {} received, {} sent",
            ctx.run_id,
            ctx.primary().sample_count(),
            ctx.primary().skipped_count(),
            counters.received,
            counters.sent
        );
    }
}

/// Handle for observing and stopping a run from outside.
#[derive(Clone)]
pub struct RunHandle {
    ctx: Arc<RunContext>,
}

impl RunHandle {
    /// Requests completion. The run still produces a report.
    pub fn stop(&self) {
        if self.ctx.signal.trigger(CompletionReason::Stopped) {
            tracing::info!("Run {} stop requested", self.ctx.run_id);
        }
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.ctx.state()
    }

    /// Returns the run identifier.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.ctx.run_id
    }

    /// Returns live message counters.
    #[must_use]
    pub fn counters(&self) -> CountersSnapshot {
        self.ctx.counters.snapshot()
    }

    /// Returns the number of samples retained so far by the primary
    /// aggregator.
    #[must_use]
    pub fn accepted(&self) -> usize {
        self.ctx.primary().sample_count()
    }
}
