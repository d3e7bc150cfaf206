//! Common utilities for all binaries
//!
//! Shared initialization, CLI parsing, and reporting code.

use anyhow::{Context, Result};
use clap::Args;
use conduit_core::config::PipelineConfig;
use conduit_core::pipeline::{PipelineReport, PipelineStats};
use std::path::PathBuf;

/// Common CLI arguments for all binaries
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// JSON configuration file (defaults apply when omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level (overrides the configuration file)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Emit JSON logs
    #[arg(long)]
    pub json_logs: bool,

    /// Print Prometheus metrics on exit
    #[arg(long)]
    pub metrics: bool,
}

impl CommonArgs {
    /// Configuration file (or defaults) with CLI overrides applied
    pub fn load_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.json_logs {
            config.logging.json = true;
        }

        config.validate().context("Invalid configuration after CLI overrides")?;
        Ok(config)
    }
}

/// Initialize tracing/logging
pub fn init_logging(config: &PipelineConfig) -> Result<()> {
    conduit_core::utils::init_from_config(&config.logging)
        .context("Failed to install tracing subscriber")
}

/// One-line progress summary
pub fn log_stats(stats: &PipelineStats) {
    let stages: Vec<String> = stats
        .stages
        .iter()
        .map(|s| format!("{}={}", s.name, s.sequence))
        .collect();
    tracing::info!(
        state = %stats.state,
        cursor = stats.cursor,
        in_flight = stats.in_flight(),
        free = stats.remaining_capacity,
        "stages: {}",
        stages.join(" ")
    );
}

/// Print final statistics
pub fn print_report(report: &PipelineReport) {
    tracing::info!("=== Final Statistics ===");
    tracing::info!("Events published: {}", report.cursor);
    tracing::info!("Drained: {}", report.drained);
    tracing::info!("Unprocessed: {}", report.unprocessed);
    tracing::info!("Uptime: {:.2?}", report.uptime);

    for stage in &report.stages {
        let c = &stage.counters;
        tracing::info!(
            "{:<12} processed={} forwarded={} rejected={} skipped={} parked={} faults={} avg={:.0}ns exit={:?}",
            stage.name,
            c.processed,
            c.forwarded,
            c.rejected,
            c.skipped,
            c.parked,
            c.faults,
            c.avg_latency_ns(),
            stage.exit
        );
    }

    if report.cursor > 0 && report.uptime.as_secs_f64() > 0.0 {
        let rate = report.cursor as f64 / report.uptime.as_secs_f64();
        tracing::info!("Throughput: {:.0} events/s", rate);
    }
}
