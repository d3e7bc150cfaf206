//! Conduit demo: simulated venue feeding the standard pipeline
//!
//! This binary wires:
//! - A FIX session (acceptor) over an in-process channel transport
//! - Duplicate-send suppression in front of the session
//! - Validation -> RiskCheck -> Router -> Audit
//! - A fixed-rate load generator that encodes FIX frames as the venue would
//!
//! Stops after `--duration` seconds or on Ctrl-C, drains, and prints stats.

use anyhow::{Context, Result};
use clap::Parser;
use conduit_bins::common::{init_logging, log_stats, print_report, CommonArgs};
use conduit_core::audit::{AuditSink, JournalAuditSink, MemoryAuditSink};
use conduit_core::core::fixed_point;
use conduit_core::gateway::fix::{msg_types, tags, FixCodec, FixMessage};
use conduit_core::gateway::{ChannelTransport, DedupGateway, FixSession};
use conduit_core::metrics::PrometheusMetrics;
use conduit_core::pipeline::SessionIngress;
use conduit_core::resilience::install_panic_handler;
use conduit_core::{Pipeline, PublishError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const SYMBOLS: [&str; 3] = ["BTC-USD", "ETH-USD", "SOL-USD"];
const STATS_INTERVAL: Duration = Duration::from_secs(1);
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(author, version, about = "Run the order pipeline against a simulated venue")]
struct DemoArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Inbound messages per second
    #[arg(short, long, default_value = "10000")]
    rate: u64,

    /// Run time in seconds
    #[arg(short, long, default_value = "10")]
    duration: u64,

    /// RNG seed for the generated flow
    #[arg(long, default_value = "42")]
    seed: u64,
}

fn main() -> Result<()> {
    let args = DemoArgs::parse();
    let config = args.common.load_config()?;

    init_logging(&config)?;
    install_panic_handler();

    tracing::info!("=== Conduit: simulated venue demo ===");
    tracing::info!("Rate: {}/s, duration: {}s", args.rate, args.duration);

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            tracing::info!("Ctrl-C received, stopping");
            running.store(false, Ordering::Release);
        })
        .context("Failed to install Ctrl-C handler")?;
    }

    let metrics = Arc::new(PrometheusMetrics::new()?);
    let audit: Arc<dyn AuditSink> = match &config.audit.journal_path {
        Some(path) => Arc::new(JournalAuditSink::with_buffer(path, config.audit.buffer)?),
        None => Arc::new(MemoryAuditSink::new()),
    };

    // Venue side of the wire: count what the pipeline sends out
    let (transport, venue_rx) = ChannelTransport::bounded(config.ring.capacity);
    let venue_orders = Arc::new(AtomicU64::new(0));
    let venue = {
        let venue_orders = venue_orders.clone();
        thread::Builder::new()
            .name("venue".to_string())
            .spawn(move || {
                for frame in venue_rx {
                    if let Ok(msg) = FixMessage::parse(&frame) {
                        if msg.msg_type().ok() != Some(msg_types::LOGON.as_bytes()) {
                            venue_orders.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })?
    };

    let session = Arc::new(FixSession::new(
        &config.gateway,
        1,
        transport,
        metrics.clone(),
    ));
    let gateway = Arc::new(DedupGateway::new(
        session.clone(),
        config.gateway.dedup_capacity,
    ));

    let venue_codec = FixCodec::new(
        config.gateway.target_comp_id.clone(),
        config.gateway.sender_comp_id.clone(),
    );

    let mut pipeline = Pipeline::standard(
        config.clone(),
        gateway.clone(),
        audit.clone(),
        metrics.clone(),
    )?;
    let producer = pipeline.producer(Some(session.gate()))?;
    let mut ingress = SessionIngress::new(gateway, producer, audit, metrics.clone());
    pipeline.start()?;

    let mut flow = Flow::new(venue_codec, args.seed);
    ingress.on_bytes(&flow.logon())?;

    let interval = Duration::from_nanos(1_000_000_000 / args.rate.max(1));
    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let mut next_send = Instant::now();
    let mut next_stats = Instant::now() + STATS_INTERVAL;
    let mut refused = 0u64;

    while running.load(Ordering::Acquire) && Instant::now() < deadline {
        match ingress.on_bytes(&flow.next_frame()) {
            Ok(_) => {}
            Err(PublishError::Ring(e)) => {
                refused += 1;
                tracing::debug!("Publish refused: {}", e);
            }
            Err(e) => {
                tracing::warn!("Stopping load: {}", e);
                break;
            }
        }

        if Instant::now() >= next_stats {
            log_stats(&pipeline.stats());
            next_stats += STATS_INTERVAL;
        }

        next_send += interval;
        let now = Instant::now();
        if next_send > now {
            thread::sleep(next_send - now);
        }
    }

    if let Err(e) = session.logout() {
        tracing::warn!("Logout failed: {}", e);
    }
    let report = pipeline.shutdown(DRAIN_TIMEOUT)?;
    print_report(&report);
    tracing::info!("Frames offered: {}, refused: {}", flow.sent, refused);

    // Releasing the pipeline closes the last handle on the transport
    drop(pipeline);
    drop(ingress);
    drop(session);
    if venue.join().is_err() {
        tracing::error!("Venue thread panicked");
    }
    tracing::info!(
        "Venue received {} outbound messages",
        venue_orders.load(Ordering::Relaxed)
    );

    if args.common.metrics {
        println!("{}", metrics.render()?);
    }

    Ok(())
}

/// Venue-side message generator
struct Flow {
    codec: FixCodec,
    rng: StdRng,
    seq: u64,
    next_order_id: u64,
    /// Orders the venue has seen and may fill or cancel
    live: Vec<(u64, &'static str)>,
    sent: u64,
}

impl Flow {
    fn new(codec: FixCodec, seed: u64) -> Self {
        Self {
            codec,
            rng: StdRng::seed_from_u64(seed),
            seq: 0,
            next_order_id: 1,
            live: Vec::new(),
            sent: 0,
        }
    }

    fn logon(&mut self) -> Vec<u8> {
        self.seq += 1;
        self.codec
            .encode(msg_types::LOGON, self.seq, &[(tags::HEART_BT_INT, "30".to_string())])
    }

    fn next_frame(&mut self) -> Vec<u8> {
        self.seq += 1;
        self.sent += 1;
        let roll: u32 = self.rng.gen_range(0..100);

        let (msg_type, body) = match roll {
            0..=59 => self.tick(),
            60..=84 => self.new_order(),
            85..=94 if !self.live.is_empty() => self.cancel(),
            _ if !self.live.is_empty() => self.fill(),
            _ => self.tick(),
        };
        self.codec.encode(msg_type, self.seq, &body)
    }

    fn symbol(&mut self) -> &'static str {
        SYMBOLS[self.rng.gen_range(0..SYMBOLS.len())]
    }

    fn mid(&mut self) -> u64 {
        self.rng.gen_range(95..=105)
    }

    fn tick(&mut self) -> (&'static str, Vec<(u32, String)>) {
        let symbol = self.symbol();
        let mid = self.mid();
        (
            msg_types::MARKET_DATA_SNAPSHOT,
            vec![
                (tags::SYMBOL, symbol.to_string()),
                (tags::BID_PX, fixed_point::format(fixed_point::from_units(mid - 1))),
                (tags::BID_SIZE, self.rng.gen_range(1..50u64).to_string()),
                (tags::OFFER_PX, fixed_point::format(fixed_point::from_units(mid + 1))),
                (tags::OFFER_SIZE, self.rng.gen_range(1..50u64).to_string()),
            ],
        )
    }

    fn new_order(&mut self) -> (&'static str, Vec<(u32, String)>) {
        let order_id = self.next_order_id;
        self.next_order_id += 1;
        let symbol = self.symbol();
        self.live.push((order_id, symbol));

        let side = if self.rng.gen_bool(0.5) { "1" } else { "2" };
        let price = self.mid();
        (
            msg_types::NEW_ORDER_SINGLE,
            vec![
                (tags::CL_ORD_ID, order_id.to_string()),
                (tags::SYMBOL, symbol.to_string()),
                (tags::SIDE, side.to_string()),
                (tags::ORDER_QTY, self.rng.gen_range(1..100u64).to_string()),
                (tags::ORD_TYPE, "2".to_string()),
                (tags::PRICE, fixed_point::format(fixed_point::from_units(price))),
            ],
        )
    }

    fn cancel(&mut self) -> (&'static str, Vec<(u32, String)>) {
        let idx = self.rng.gen_range(0..self.live.len());
        let (order_id, symbol) = self.live.swap_remove(idx);
        (
            msg_types::ORDER_CANCEL_REQUEST,
            vec![
                (tags::ORIG_CL_ORD_ID, order_id.to_string()),
                (tags::SYMBOL, symbol.to_string()),
            ],
        )
    }

    fn fill(&mut self) -> (&'static str, Vec<(u32, String)>) {
        let idx = self.rng.gen_range(0..self.live.len());
        let (order_id, symbol) = self.live.swap_remove(idx);
        let price = self.mid();
        (
            msg_types::EXECUTION_REPORT,
            vec![
                (tags::CL_ORD_ID, order_id.to_string()),
                (tags::SYMBOL, symbol.to_string()),
                (tags::SIDE, "1".to_string()),
                (tags::EXEC_TYPE, "2".to_string()),
                (tags::LAST_QTY, self.rng.gen_range(1..100u64).to_string()),
                (tags::LAST_PX, fixed_point::format(fixed_point::from_units(price))),
                (tags::LEAVES_QTY, "0".to_string()),
            ],
        )
    }
}
