//! Pipeline wiring and lifecycle
//!
//! ```text
//!   ProducerHandle(s) ──▶ RingBuffer ──▶ stage 0 ──▶ stage 1 ──▶ ... ──▶ stage n
//!                          cursor        barrier     barrier           (gates the
//!                                        on cursor   on stage 0         producer)
//! ```
//!
//! Every stage sequence gates the producer, so no slot is overwritten
//! before all stages have released it.
//!
//! # Lifecycle
//!
//! ```text
//!   Built ──start()──▶ Running ──drain()──▶ Draining ──stop()──▶ Stopped
//!     │                   │                                  ▲
//!     └───────────────────┴────────────stop()────────────────┘
//! ```
//!
//! - `drain(timeout)`: stop accepting, wait for the last stage to reach the
//!   producer cursor, else `DrainTimeout` (the caller decides what next)
//! - `stop()`: halt the ring, wake every waiter, join the stage threads
//! - `shutdown(timeout)`: drain, then stop even if the drain timed out

pub mod ingress;
pub mod producer;

pub use ingress::SessionIngress;
pub use producer::ProducerHandle;

use producer::Admission;

use crate::audit::AuditSink;
use crate::config::PipelineConfig;
use crate::core::{EventSlot, PipelineError};
use crate::gateway::{SessionGate, SessionGateway};
use crate::metrics::{MetricsSink, NoopMetrics, StageCounters, StageCountersSnapshot};
use crate::perf::{core_for_stage, pin_to_core};
use crate::resilience::BackoffConfig;
use crate::ring::{min_sequence, ProducerMode, RingBuffer, Sequence};
use crate::stage::{Audit, RiskCheck, Router, RunnerExit, RunnerSummary, Stage, StageRunner, Validation};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Poll interval while draining
const DRAIN_POLL: Duration = Duration::from_micros(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Built,
    Running,
    Draining,
    Stopped,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Built => "Built",
            PipelineState::Running => "Running",
            PipelineState::Draining => "Draining",
            PipelineState::Stopped => "Stopped",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of one stage
#[derive(Debug, Clone, PartialEq)]
pub struct StageStats {
    pub name: &'static str,
    /// Last sequence the stage released
    pub sequence: u64,
    pub counters: StageCountersSnapshot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStats {
    pub state: PipelineState,
    /// Highest published sequence
    pub cursor: u64,
    pub remaining_capacity: usize,
    pub stages: Vec<StageStats>,
}

impl PipelineStats {
    /// Published events not yet released by the last stage
    pub fn in_flight(&self) -> u64 {
        let slowest = self.stages.iter().map(|s| s.sequence).min().unwrap_or(self.cursor);
        self.cursor.saturating_sub(slowest)
    }
}

/// Final accounting returned by [`Pipeline::stop`]
#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    pub name: &'static str,
    pub exit: RunnerExit,
    pub last_sequence: u64,
    pub counters: StageCountersSnapshot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub cursor: u64,
    pub stages: Vec<StageReport>,
    /// Published events the last stage never released (lost on force-stop)
    pub unprocessed: u64,
    /// Whether a preceding drain completed
    pub drained: bool,
    pub uptime: Duration,
}

impl PipelineReport {
    /// Stages that stopped on a fault
    pub fn faults(&self) -> impl Iterator<Item = &StageReport> {
        self.stages
            .iter()
            .filter(|s| matches!(s.exit, RunnerExit::Faulted { .. }))
    }

    pub fn is_clean(&self) -> bool {
        self.unprocessed == 0 && self.faults().next().is_none()
    }
}

struct StageHandle {
    name: &'static str,
    stage: Option<Box<dyn Stage>>,
    sequence: Arc<Sequence>,
    counters: Arc<StageCounters>,
    thread: Option<JoinHandle<RunnerSummary>>,
}

/// Assembles a linear chain of stages over one ring
pub struct PipelineBuilder {
    config: PipelineConfig,
    metrics: Arc<dyn MetricsSink>,
    stages: Vec<Box<dyn Stage>>,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(NoopMetrics),
            stages: Vec::new(),
        }
    }

    pub fn metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Append a stage; it is gated by the previously added one
    pub fn stage<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn boxed_stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn build(self) -> Result<Pipeline, PipelineError> {
        if self.stages.is_empty() {
            return Err(PipelineError::NoStages);
        }
        self.config
            .validate()
            .map_err(|e| PipelineError::Config(format!("{:#}", e)))?;

        let ring_cfg = &self.config.ring;
        let ring = Arc::new(RingBuffer::new(
            ring_cfg.capacity,
            ring_cfg.producer_mode,
            ring_cfg.backpressure,
            ring_cfg.wait_strategy.build(),
        )?);

        let stages: Vec<StageHandle> = self
            .stages
            .into_iter()
            .map(|stage| StageHandle {
                name: stage.name(),
                stage: Some(stage),
                sequence: Sequence::shared(),
                counters: Arc::new(StageCounters::new()),
                thread: None,
            })
            .collect();

        let gating: Vec<Arc<Sequence>> = stages.iter().map(|s| s.sequence.clone()).collect();
        ring.add_gating_sequences(&gating);

        info!(
            capacity = ring_cfg.capacity,
            mode = ?ring_cfg.producer_mode,
            backpressure = ?ring_cfg.backpressure,
            wait_strategy = ?ring_cfg.wait_strategy,
            stages = ?stages.iter().map(|s| s.name).collect::<Vec<_>>(),
            "Pipeline built"
        );

        Ok(Pipeline {
            config: self.config,
            ring,
            stages,
            metrics: self.metrics,
            admission: Arc::new(Admission::new()),
            producer_claimed: AtomicBool::new(false),
            state: PipelineState::Built,
            started_at: None,
            drained: false,
        })
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    ring: Arc<RingBuffer<EventSlot>>,
    stages: Vec<StageHandle>,
    metrics: Arc<dyn MetricsSink>,
    admission: Arc<Admission>,
    producer_claimed: AtomicBool,
    state: PipelineState,
    started_at: Option<Instant>,
    drained: bool,
}

impl Pipeline {
    /// Validation -> RiskCheck -> Router -> Audit
    pub fn standard(
        config: PipelineConfig,
        gateway: Arc<dyn SessionGateway>,
        audit: Arc<dyn AuditSink>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, PipelineError> {
        let validation = Validation::new(&config.validation, metrics.clone());
        let risk = RiskCheck::new(&config.risk, metrics.clone());
        let router = Router::new(gateway, metrics.clone());
        let audit = Audit::new(audit, metrics.clone());

        PipelineBuilder::new(config)
            .metrics(metrics)
            .stage(validation)
            .stage(risk)
            .stage(router)
            .stage(audit)
            .build()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn ring(&self) -> &Arc<RingBuffer<EventSlot>> {
        &self.ring
    }

    /// Highest published sequence
    pub fn cursor(&self) -> u64 {
        self.ring.cursor()
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name).collect()
    }

    /// Hand out a producer, optionally bound to a session gate
    ///
    /// Single-producer rings hand out exactly one.
    pub fn producer(&self, gate: Option<SessionGate>) -> Result<ProducerHandle, PipelineError> {
        if self.ring.sequencer().mode() == ProducerMode::Single
            && self.producer_claimed.swap(true, Ordering::AcqRel)
        {
            return Err(PipelineError::ProducerAlreadyClaimed);
        }

        Ok(ProducerHandle::new(
            self.ring.clone(),
            self.admission.clone(),
            gate,
            self.metrics.clone(),
        ))
    }

    /// Spawn one thread per stage, in dependency order
    pub fn start(&mut self) -> Result<(), PipelineError> {
        self.expect_state(PipelineState::Built)?;

        for index in 0..self.stages.len() {
            let dependents = match index {
                0 => Vec::new(),
                _ => vec![self.stages[index - 1].sequence.clone()],
            };
            let barrier = self.ring.new_barrier(dependents);

            let handle = &mut self.stages[index];
            let Some(stage) = handle.stage.take() else {
                continue;
            };
            let name = handle.name;

            let runner = StageRunner::new(
                stage,
                self.ring.clone(),
                barrier,
                handle.sequence.clone(),
                handle.counters.clone(),
                self.metrics.clone(),
                BackoffConfig::for_stage(&self.config.stages, name),
                self.config.stages.failure_policy,
            );
            let core = core_for_stage(&self.config.stages.pin_cores, index);

            let spawned = thread::Builder::new()
                .name(format!("conduit-{}", name))
                .spawn(move || {
                    if let Some(core) = core {
                        if let Err(e) = pin_to_core(core) {
                            warn!(stage = name, core, "CPU pinning failed: {:#}", e);
                        }
                    }
                    runner.run()
                });

            match spawned {
                Ok(thread) => handle.thread = Some(thread),
                Err(source) => {
                    error!(stage = name, "Failed to spawn stage thread: {}", source);
                    self.halt_and_join();
                    self.state = PipelineState::Stopped;
                    return Err(PipelineError::Spawn {
                        stage: name,
                        source,
                    });
                }
            }
        }

        self.state = PipelineState::Running;
        self.started_at = Some(Instant::now());
        info!(stages = self.stages.len(), "Pipeline started");
        Ok(())
    }

    /// Stop accepting and wait until every published event has passed the
    /// last stage
    pub fn drain(&mut self, timeout: Duration) -> Result<(), PipelineError> {
        if self.state != PipelineState::Draining {
            self.expect_state(PipelineState::Running)?;
        }
        self.admission.close();
        self.state = PipelineState::Draining;

        let started = Instant::now();
        loop {
            // Publishes admitted before the close must land before the target is fixed
            let in_flight = self.admission.in_flight();
            let target = self.ring.sequencer().highest_claimed();
            let slowest = self.slowest_sequence();
            if in_flight == 0 && slowest >= target {
                info!(cursor = target, elapsed = ?started.elapsed(), "Pipeline drained");
                self.drained = true;
                return Ok(());
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout || self.ring.is_halted() {
                warn!(cursor = target, slowest, in_flight, ?elapsed, "Drain timed out");
                return Err(PipelineError::DrainTimeout {
                    cursor: target,
                    slowest,
                    elapsed,
                });
            }
            thread::sleep(DRAIN_POLL);
        }
    }

    /// Halt the ring, join every stage thread, and report
    ///
    /// Events not yet released by the last stage are abandoned.
    pub fn stop(&mut self) -> Result<PipelineReport, PipelineError> {
        if self.state == PipelineState::Stopped {
            return Err(PipelineError::InvalidState {
                expected: "Running",
                found: self.state.as_str(),
            });
        }

        let summaries = self.halt_and_join();
        self.state = PipelineState::Stopped;

        let cursor = self.ring.cursor();
        let stages: Vec<StageReport> = self
            .stages
            .iter()
            .zip(summaries)
            .map(|(handle, summary)| StageReport {
                name: handle.name,
                exit: summary
                    .as_ref()
                    .map(|s| s.exit.clone())
                    .unwrap_or(RunnerExit::Halted),
                last_sequence: handle.sequence.get(),
                counters: handle.counters.snapshot(),
            })
            .collect();

        let report = PipelineReport {
            cursor,
            unprocessed: cursor.saturating_sub(self.slowest_sequence()),
            stages,
            drained: self.drained,
            uptime: self.started_at.map(|t| t.elapsed()).unwrap_or_default(),
        };

        if report.unprocessed > 0 {
            warn!(
                unprocessed = report.unprocessed,
                "Pipeline stopped with unprocessed events"
            );
        }
        for fault in report.faults() {
            error!(stage = fault.name, exit = ?fault.exit, "Stage stopped on fault");
        }
        info!(cursor, uptime = ?report.uptime, "Pipeline stopped");
        Ok(report)
    }

    /// Drain, then stop; a drain timeout force-stops
    pub fn shutdown(&mut self, timeout: Duration) -> Result<PipelineReport, PipelineError> {
        match self.drain(timeout) {
            Ok(()) => {}
            Err(e @ PipelineError::DrainTimeout { .. }) => {
                warn!("Force-stopping after drain failure: {}", e);
            }
            Err(PipelineError::InvalidState { .. }) if self.state == PipelineState::Built => {
                self.admission.close();
            }
            Err(e) => return Err(e),
        }
        self.stop()
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            state: self.state,
            cursor: self.ring.cursor(),
            remaining_capacity: self.ring.remaining_capacity(),
            stages: self
                .stages
                .iter()
                .map(|s| StageStats {
                    name: s.name,
                    sequence: s.sequence.get(),
                    counters: s.counters.snapshot(),
                })
                .collect(),
        }
    }

    fn expect_state(&self, expected: PipelineState) -> Result<(), PipelineError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(PipelineError::InvalidState {
                expected: expected.as_str(),
                found: self.state.as_str(),
            })
        }
    }

    fn slowest_sequence(&self) -> u64 {
        let sequences: Vec<Arc<Sequence>> = self.stages.iter().map(|s| s.sequence.clone()).collect();
        min_sequence(&sequences, self.ring.cursor())
    }

    fn halt_and_join(&mut self) -> Vec<Option<RunnerSummary>> {
        self.admission.close();
        self.ring.halt();

        self.stages
            .iter_mut()
            .map(|handle| {
                let thread = handle.thread.take()?;
                match thread.join() {
                    Ok(summary) => Some(summary),
                    Err(payload) => {
                        let message = crate::resilience::payload_message(payload.as_ref());
                        error!(stage = handle.name, %message, "Stage thread panicked");
                        Some(RunnerSummary {
                            stage: handle.name,
                            exit: RunnerExit::Faulted {
                                sequence: handle.sequence.get() + 1,
                                message,
                            },
                            last_sequence: handle.sequence.get(),
                        })
                    }
                }
            })
            .collect()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if matches!(self.state, PipelineState::Running | PipelineState::Draining) {
            self.halt_and_join();
            self.state = PipelineState::Stopped;
        }
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("state", &self.state)
            .field("stages", &self.stage_names())
            .field("cursor", &self.ring.cursor())
            .finish_non_exhaustive()
    }
}
