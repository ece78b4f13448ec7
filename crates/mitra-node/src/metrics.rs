// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MITRA - METRICS MODULE
//
// Prometheus counters for ledger activity and the HTTP surface, exported
// as text on GET /metrics.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

use mitra_core::LedgerError;

pub struct MitraMetrics {
    registry: Registry,

    // Ledger
    pub schemes_applied_total: IntCounter,
    pub schemes_duplicate_total: IntCounter,
    pub perks_redeemed_total: IntCounter,
    pub redemptions_rejected_total: IntCounter,
    pub rewards_total: IntCounter,
    pub tokens_rewarded_total: IntCounter,
    pub tokens_redeemed_total: IntCounter,
    pub accounts: IntGauge,

    // Concurrency
    pub commit_conflicts_total: IntCounter,
    pub contention_failures_total: IntCounter,

    // API
    pub api_requests_total: IntCounter,
    pub api_errors_total: IntCounter,
    pub api_request_duration_seconds: Histogram,
    pub rate_limit_rejections_total: IntCounter,
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, prometheus::Error> {
    let c = IntCounter::with_opts(Opts::new(name, help))?;
    registry.register(Box::new(c.clone()))?;
    Ok(c)
}

impl MitraMetrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let schemes_applied_total = counter(
            &registry,
            "mitra_schemes_applied_total",
            "Scheme applications recorded in a ledger",
        )?;
        let schemes_duplicate_total = counter(
            &registry,
            "mitra_schemes_duplicate_total",
            "Scheme applications ignored because the scheme was already recorded",
        )?;
        let perks_redeemed_total =
            counter(&registry, "mitra_perks_redeemed_total", "Successful perk redemptions")?;
        let redemptions_rejected_total = counter(
            &registry,
            "mitra_redemptions_rejected_total",
            "Redemptions refused for insufficient funds",
        )?;
        let rewards_total = counter(&registry, "mitra_rewards_total", "Engagement rewards granted")?;
        let tokens_rewarded_total = counter(
            &registry,
            "mitra_tokens_rewarded_total",
            "Tokens credited by scheme rewards and engagement rewards",
        )?;
        let tokens_redeemed_total =
            counter(&registry, "mitra_tokens_redeemed_total", "Tokens spent on perks")?;

        let accounts = IntGauge::with_opts(Opts::new("mitra_accounts", "Stored accounts"))?;
        registry.register(Box::new(accounts.clone()))?;

        let commit_conflicts_total = counter(
            &registry,
            "mitra_commit_conflicts_total",
            "Commits that lost a race and were retried",
        )?;
        let contention_failures_total = counter(
            &registry,
            "mitra_contention_failures_total",
            "Operations that exhausted their commit attempts",
        )?;

        let api_requests_total =
            counter(&registry, "mitra_api_requests_total", "Total API requests")?;
        let api_errors_total =
            counter(&registry, "mitra_api_errors_total", "API requests answered with an error")?;
        let api_request_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "mitra_api_request_duration_seconds",
                "API request latency in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )?;
        registry.register(Box::new(api_request_duration_seconds.clone()))?;
        let rate_limit_rejections_total = counter(
            &registry,
            "mitra_rate_limit_rejections_total",
            "Requests refused by the rate limiter",
        )?;

        Ok(Arc::new(Self {
            registry,
            schemes_applied_total,
            schemes_duplicate_total,
            perks_redeemed_total,
            redemptions_rejected_total,
            rewards_total,
            tokens_rewarded_total,
            tokens_redeemed_total,
            accounts,
            commit_conflicts_total,
            contention_failures_total,
            api_requests_total,
            api_errors_total,
            api_request_duration_seconds,
            rate_limit_rejections_total,
        }))
    }

    /// Export all metrics in Prometheus text format
    pub fn export(&self) -> Result<String, Box<dyn std::error::Error>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn record_conflicts(&self, conflicts: u32) {
        self.commit_conflicts_total.inc_by(u64::from(conflicts));
    }

    /// Count a failed core operation by kind.
    pub fn record_failure(&self, err: &LedgerError) {
        self.api_errors_total.inc();
        match err {
            LedgerError::InsufficientFunds { .. } => self.redemptions_rejected_total.inc(),
            LedgerError::Contention { attempts } => {
                self.contention_failures_total.inc();
                self.record_conflicts(*attempts);
            }
            _ => {}
        }
    }
}
