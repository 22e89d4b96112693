//! Command and event counters for the CDP transport.
//!
//! Prometheus collectors carry per-method labels for embedders that register them; the atomic
//! totals back [`snapshot`] for in-process reporting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{
    core::Collector, histogram_opts, HistogramVec, IntCounterVec, Opts, Registry,
};
use tracing::error;

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdapterMetricsSnapshot {
    pub commands: u64,
    pub failures: u64,
    pub events: u64,
    pub latency_total_us: u64,
}

impl AdapterMetricsSnapshot {
    pub fn succeeded(&self) -> u64 {
        self.commands.saturating_sub(self.failures)
    }

    /// Mean latency of successful commands.
    pub fn mean_latency(&self) -> Option<Duration> {
        let ok = self.succeeded();
        (ok > 0).then(|| Duration::from_micros(self.latency_total_us / ok))
    }
}

static COMMANDS: AtomicU64 = AtomicU64::new(0);
static FAILURES: AtomicU64 = AtomicU64::new(0);
static EVENTS: AtomicU64 = AtomicU64::new(0);
static LATENCY_TOTAL_US: AtomicU64 = AtomicU64::new(0);

lazy_static! {
    static ref COMMANDS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("relay_cdp_commands_total", "CDP commands by method and result"),
        &["method", "result"]
    )
    .unwrap();
    static ref COMMAND_SECONDS: HistogramVec = HistogramVec::new(
        histogram_opts!(
            "relay_cdp_command_seconds",
            "Latency of successful CDP commands",
            vec![0.005, 0.025, 0.1, 0.25, 1.0, 2.5, 10.0]
        ),
        &["method"]
    )
    .unwrap();
    static ref EVENTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("relay_cdp_events_total", "CDP events by protocol domain"),
        &["domain"]
    )
    .unwrap();
}

pub fn register_metrics(registry: &Registry) {
    fn add<C: Collector + Clone + 'static>(registry: &Registry, collector: &C) {
        match registry.register(Box::new(collector.clone())) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(err) => error!(target: "cdp-adapter", ?err, "failed to register metric"),
        }
    }
    add(registry, &*COMMANDS_TOTAL);
    add(registry, &*COMMAND_SECONDS);
    add(registry, &*EVENTS_TOTAL);
}

/// Record one finished command. Latency is only observed for successes.
pub fn observe_command(method: &str, elapsed: Duration, ok: bool) {
    COMMANDS.fetch_add(1, Ordering::Relaxed);
    if ok {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        LATENCY_TOTAL_US.fetch_add(micros, Ordering::Relaxed);
        COMMAND_SECONDS
            .with_label_values(&[method])
            .observe(elapsed.as_secs_f64());
    } else {
        FAILURES.fetch_add(1, Ordering::Relaxed);
    }
    let result = if ok { "ok" } else { "error" };
    COMMANDS_TOTAL.with_label_values(&[method, result]).inc();
}

/// Record an incoming event; `method` is the full CDP name, e.g. `Page.lifecycleEvent`.
pub fn observe_event(method: &str) {
    EVENTS.fetch_add(1, Ordering::Relaxed);
    let domain = method.split_once('.').map_or(method, |(domain, _)| domain);
    EVENTS_TOTAL.with_label_values(&[domain]).inc();
}

pub fn snapshot() -> AdapterMetricsSnapshot {
    AdapterMetricsSnapshot {
        commands: COMMANDS.load(Ordering::Relaxed),
        failures: FAILURES.load(Ordering::Relaxed),
        events: EVENTS.load(Ordering::Relaxed),
        latency_total_us: LATENCY_TOTAL_US.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    for counter in [&COMMANDS, &FAILURES, &EVENTS, &LATENCY_TOTAL_US] {
        counter.store(0, Ordering::Relaxed);
    }
}
