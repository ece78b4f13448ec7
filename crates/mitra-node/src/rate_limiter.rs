// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MITRA - RATE LIMITER
//
// Per-client-IP token bucket in front of every route. Integer millitoken
// math so refills are exact and platform independent.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Recover from poisoned mutex instead of panicking
fn safe_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// 1 token = 1000 millitokens
const MILLITOKEN: u64 = 1000;

/// Buckets idle for longer than this are forgotten.
const IDLE_EVICTION: Duration = Duration::from_secs(600);

#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<IpAddr, Bucket>>>,
    capacity_milli: u64,
    refill_per_sec: u32,
    sweep_every: Duration,
    last_sweep: Arc<Mutex<Instant>>,
}

struct Bucket {
    tokens_milli: u64,
    refilled_at: Instant,
}

impl RateLimiter {
    /// `burst` defaults to twice the sustained rate.
    pub fn new(requests_per_second: u32, burst: Option<u32>) -> Self {
        let burst = burst.unwrap_or(requests_per_second.saturating_mul(2)).max(1);
        RateLimiter {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            capacity_milli: u64::from(burst) * MILLITOKEN,
            refill_per_sec: requests_per_second,
            sweep_every: Duration::from_secs(300),
            last_sweep: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Take one token for `ip`. Returns false when the bucket is empty.
    pub fn check(&self, ip: IpAddr) -> bool {
        self.check_at(ip, Instant::now())
    }

    /// [`check`](Self::check) against an explicit instant.
    pub fn check_at(&self, ip: IpAddr, now: Instant) -> bool {
        self.sweep_if_due(now);

        let mut buckets = safe_lock(&self.buckets);
        let bucket = buckets.entry(ip).or_insert(Bucket {
            tokens_milli: self.capacity_milli,
            refilled_at: now,
        });

        // elapsed_ms * rate * MILLITOKEN / 1000 == elapsed_ms * rate
        let elapsed_ms = now.saturating_duration_since(bucket.refilled_at).as_millis() as u64;
        let refill = elapsed_ms.saturating_mul(u64::from(self.refill_per_sec));
        bucket.tokens_milli = bucket.tokens_milli.saturating_add(refill).min(self.capacity_milli);
        bucket.refilled_at = now;

        if bucket.tokens_milli >= MILLITOKEN {
            bucket.tokens_milli -= MILLITOKEN;
            true
        } else {
            false
        }
    }

    pub fn tracked_ips(&self) -> usize {
        safe_lock(&self.buckets).len()
    }

    fn sweep_if_due(&self, now: Instant) {
        let mut last_sweep = safe_lock(&self.last_sweep);
        if now.saturating_duration_since(*last_sweep) < self.sweep_every {
            return;
        }
        safe_lock(&self.buckets)
            .retain(|_, b| now.saturating_duration_since(b.refilled_at) < IDLE_EVICTION);
        *last_sweep = now;
    }
}

/// Warp filter for rate limiting
pub mod filters {
    use super::RateLimiter;
    use std::net::IpAddr;
    use warp::Filter;

    /// Remote address, or loopback when the transport doesn't report one.
    pub fn client_ip() -> impl Filter<Extract = (IpAddr,), Error = std::convert::Infallible> + Clone
    {
        warp::addr::remote().map(|addr: Option<std::net::SocketAddr>| {
            addr.map(|a| a.ip())
                .unwrap_or_else(|| IpAddr::from([127, 0, 0, 1]))
        })
    }

    pub fn rate_limit(
        limiter: RateLimiter,
    ) -> impl Filter<Extract = (), Error = warp::Rejection> + Clone {
        client_ip()
            .and(warp::any().map(move || limiter.clone()))
            .and_then(|ip: IpAddr, limiter: RateLimiter| async move {
                if limiter.check(ip) {
                    Ok(())
                } else {
                    Err(warp::reject::custom(RateLimitExceeded { ip }))
                }
            })
            .untuple_one()
    }

    #[derive(Debug)]
    pub struct RateLimitExceeded {
        pub ip: IpAddr,
    }

    impl warp::reject::Reject for RateLimitExceeded {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn test_burst_then_block() {
        let limiter = RateLimiter::new(10, Some(20));
        let t0 = Instant::now();
        for i in 0..20 {
            assert!(limiter.check_at(ip(1), t0), "request {} should pass", i);
        }
        assert!(!limiter.check_at(ip(1), t0));
    }

    #[test]
    fn test_refill_is_proportional_to_elapsed_time() {
        let limiter = RateLimiter::new(10, Some(10));
        let t0 = Instant::now();
        for _ in 0..10 {
            assert!(limiter.check_at(ip(2), t0));
        }
        assert!(!limiter.check_at(ip(2), t0));

        // 10 req/s refills one token every 100ms.
        let t1 = t0 + Duration::from_millis(250);
        assert!(limiter.check_at(ip(2), t1));
        assert!(limiter.check_at(ip(2), t1));
        assert!(!limiter.check_at(ip(2), t1));
    }

    #[test]
    fn test_buckets_are_per_ip() {
        let limiter = RateLimiter::new(5, Some(5));
        let t0 = Instant::now();
        for _ in 0..5 {
            assert!(limiter.check_at(ip(3), t0));
        }
        assert!(!limiter.check_at(ip(3), t0));
        assert!(limiter.check_at(ip(4), t0));
        assert_eq!(limiter.tracked_ips(), 2);
    }

    #[test]
    fn test_idle_buckets_are_swept() {
        let limiter = RateLimiter::new(5, None);
        let t0 = Instant::now();
        limiter.check_at(ip(5), t0);
        limiter.check_at(ip(6), t0);
        assert_eq!(limiter.tracked_ips(), 2);

        let later = t0 + IDLE_EVICTION + Duration::from_secs(1);
        limiter.check_at(ip(7), later);
        assert_eq!(limiter.tracked_ips(), 1);
    }
}
