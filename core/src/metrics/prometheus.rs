//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed metric groups for the consensus
//! engine, the transaction pool, and the block creator, plus an async
//! HTTP exporter that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{
    self, Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Consensus-related Prometheus metrics: block import, fork choice, and
/// difficulty retargeting.
#[derive(Clone)]
pub struct ConsensusMetrics {
    /// Latency of full block validation (signature, PoBS, fulfillments).
    pub block_validation_seconds: Histogram,
    /// Total number of blocks accepted onto the canonical chain.
    pub blocks_accepted: IntCounter,
    /// Total number of blocks rejected during validation.
    pub blocks_rejected: IntCounter,
    /// Total number of reorgs the fork-choice rule has triggered.
    pub reorgs_total: IntCounter,
    /// Depth, in blocks, of the most recent reorg.
    pub last_reorg_depth: IntGauge,
    /// Current chain tip height.
    pub tip_height: IntGauge,
    /// Current retarget difficulty, expressed as the fraction of the
    /// 256-bit target space the target occupies (0..1), since the raw
    /// 256-bit value does not fit a Prometheus gauge.
    pub current_target_fraction: Gauge,
}

impl ConsensusMetrics {
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let block_validation_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "consensus_block_validation_seconds",
                "Time to validate a block in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
        )?;
        registry.register(Box::new(block_validation_seconds.clone()))?;

        let blocks_accepted = IntCounter::with_opts(Opts::new(
            "consensus_blocks_accepted_total",
            "Total number of blocks accepted onto the canonical chain",
        ))?;
        registry.register(Box::new(blocks_accepted.clone()))?;

        let blocks_rejected = IntCounter::with_opts(Opts::new(
            "consensus_blocks_rejected_total",
            "Total number of blocks rejected during validation",
        ))?;
        registry.register(Box::new(blocks_rejected.clone()))?;

        let reorgs_total = IntCounter::with_opts(Opts::new(
            "consensus_reorgs_total",
            "Total number of chain reorganizations",
        ))?;
        registry.register(Box::new(reorgs_total.clone()))?;

        let last_reorg_depth = IntGauge::with_opts(Opts::new(
            "consensus_last_reorg_depth",
            "Depth in blocks of the most recent reorganization",
        ))?;
        registry.register(Box::new(last_reorg_depth.clone()))?;

        let tip_height = IntGauge::with_opts(Opts::new(
            "consensus_tip_height",
            "Current chain tip height",
        ))?;
        registry.register(Box::new(tip_height.clone()))?;

        let current_target_fraction = Gauge::with_opts(Opts::new(
            "consensus_current_target_fraction",
            "Current retarget difficulty as a fraction of the 256-bit target space (0..1)",
        ))?;
        registry.register(Box::new(current_target_fraction.clone()))?;

        Ok(Self {
            block_validation_seconds,
            blocks_accepted,
            blocks_rejected,
            reorgs_total,
            last_reorg_depth,
            tip_height,
            current_target_fraction,
        })
    }
}

/// Transaction pool metrics.
#[derive(Clone)]
pub struct PoolMetrics {
    /// Number of transactions currently admitted to the pool.
    pub pool_size: IntGauge,
    /// Total number of transactions rejected from admission.
    pub transactions_rejected: IntCounter,
    /// Total number of times the pool has been purged after a reorg.
    pub purges_total: IntCounter,
}

impl PoolMetrics {
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let pool_size = IntGauge::with_opts(Opts::new(
            "txpool_size",
            "Number of transactions currently admitted to the pool",
        ))?;
        registry.register(Box::new(pool_size.clone()))?;

        let transactions_rejected = IntCounter::with_opts(Opts::new(
            "txpool_transactions_rejected_total",
            "Total number of transactions rejected from admission",
        ))?;
        registry.register(Box::new(transactions_rejected.clone()))?;

        let purges_total = IntCounter::with_opts(Opts::new(
            "txpool_purges_total",
            "Total number of times the pool has been purged after a reorg",
        ))?;
        registry.register(Box::new(purges_total.clone()))?;

        Ok(Self { pool_size, transactions_rejected, purges_total })
    }
}

/// Block creator metrics.
#[derive(Clone)]
pub struct CreatorMetrics {
    /// Latency of a single PoBS solve attempt (one `try_create_block` call).
    pub solve_attempt_seconds: Histogram,
    /// Total number of blocks this node has produced.
    pub blocks_produced: IntCounter,
}

impl CreatorMetrics {
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let solve_attempt_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "creator_solve_attempt_seconds",
                "Time spent in a single PoBS solve attempt, in seconds",
            )
            .buckets(vec![0.0001, 0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
        )?;
        registry.register(Box::new(solve_attempt_seconds.clone()))?;

        let blocks_produced = IntCounter::with_opts(Opts::new(
            "creator_blocks_produced_total",
            "Total number of blocks this node has produced",
        ))?;
        registry.register(Box::new(blocks_produced.clone()))?;

        Ok(Self { solve_attempt_seconds, blocks_produced })
    }
}

/// Wrapper around a Prometheus registry and every metric group.
///
/// This is the main handle you pass around in the node. It can be
/// wrapped in an [`Arc`] and shared across threads/tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub consensus: ConsensusMetrics,
    pub pool: PoolMetrics,
    pub creator: CreatorMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers every metric group.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("pobs".to_string()), None)?;
        let consensus = ConsensusMetrics::register(&registry)?;
        let pool = PoolMetrics::register(&registry)?;
        let creator = CreatorMetrics::register(&registry)?;
        Ok(Self { registry, consensus, pool, creator })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!(error = %e, "failed to encode Prometheus metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                tracing::warn!(error = %err, "prometheus HTTP server connection error");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = metrics.gather_text();
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
                .body(Full::new(Bytes::from(body)))
                .unwrap())
        }
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("not found")))
            .unwrap()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn consensus_metrics_register_and_record() {
        let registry = Registry::new();
        let metrics = ConsensusMetrics::register(&registry).expect("register metrics");

        metrics.block_validation_seconds.observe(0.123);
        metrics.blocks_accepted.inc();
        metrics.last_reorg_depth.set(3);
        metrics.current_target_fraction.set(0.5);

        let metric_families = registry.gather();
        assert!(!metric_families.is_empty());
    }

    #[test]
    fn pool_and_creator_metrics_register_and_record() {
        let registry = Registry::new();
        let pool = PoolMetrics::register(&registry).expect("register pool metrics");
        let creator = CreatorMetrics::register(&registry).expect("register creator metrics");

        pool.pool_size.set(7);
        pool.transactions_rejected.inc();
        creator.solve_attempt_seconds.observe(0.02);
        creator.blocks_produced.inc();

        let metric_families = registry.gather();
        assert!(!metric_families.is_empty());
    }

    #[test]
    fn metrics_registry_gather_text_works() {
        let registry = MetricsRegistry::new().expect("create metrics registry");
        registry.consensus.block_validation_seconds.observe(0.01);
        let text = registry.gather_text();
        assert!(text.contains("pobs_consensus_block_validation_seconds"));
    }
}
