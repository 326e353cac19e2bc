//! Prometheus metrics for scanner cycles and the control surface

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

pub struct Metrics {
    registry: Registry,
    pub cycles_total: IntCounterVec,
    pub cycle_errors_total: IntCounterVec,
    pub cycle_duration_seconds: HistogramVec,
    pub signals_total: IntCounterVec,
    pub alerts_sent_total: IntCounterVec,
    pub alerts_suppressed_total: IntCounterVec,
    pub dispatch_failures_total: IntCounterVec,
    pub http_requests_total: IntCounter,
    pub http_requests_in_flight: IntGauge,
    pub http_request_duration_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let cycles_total = IntCounterVec::new(
            Opts::new("scanner_cycles_total", "Completed detector cycles"),
            &["detector"],
        )?;
        let cycle_errors_total = IntCounterVec::new(
            Opts::new("scanner_cycle_errors_total", "Detector cycles aborted by an error"),
            &["detector"],
        )?;
        let cycle_duration_seconds = HistogramVec::new(
            HistogramOpts::new("scanner_cycle_duration_seconds", "Detector cycle duration")
                .buckets(vec![0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0]),
            &["detector"],
        )?;
        let signals_total = IntCounterVec::new(
            Opts::new("scanner_signals_total", "Signals detected before cooldown gating"),
            &["detector"],
        )?;
        let alerts_sent_total = IntCounterVec::new(
            Opts::new("scanner_alerts_sent_total", "Alerts handed to the notifier"),
            &["detector"],
        )?;
        let alerts_suppressed_total = IntCounterVec::new(
            Opts::new("scanner_alerts_suppressed_total", "Signals suppressed by an active cooldown"),
            &["detector"],
        )?;
        let dispatch_failures_total = IntCounterVec::new(
            Opts::new("scanner_dispatch_failures_total", "Alerts the notifier failed to deliver"),
            &["detector"],
        )?;
        let http_requests_total =
            IntCounter::new("http_requests_total", "HTTP requests served")?;
        let http_requests_in_flight =
            IntGauge::new("http_requests_in_flight", "HTTP requests currently being served")?;
        let http_request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency",
        ))?;

        registry.register(Box::new(cycles_total.clone()))?;
        registry.register(Box::new(cycle_errors_total.clone()))?;
        registry.register(Box::new(cycle_duration_seconds.clone()))?;
        registry.register(Box::new(signals_total.clone()))?;
        registry.register(Box::new(alerts_sent_total.clone()))?;
        registry.register(Box::new(alerts_suppressed_total.clone()))?;
        registry.register(Box::new(dispatch_failures_total.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            cycles_total,
            cycle_errors_total,
            cycle_duration_seconds,
            signals_total,
            alerts_sent_total,
            alerts_suppressed_total,
            dispatch_failures_total,
            http_requests_total,
            http_requests_in_flight,
            http_request_duration_seconds,
        })
    }

    /// Prometheus text exposition of every registered metric.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
