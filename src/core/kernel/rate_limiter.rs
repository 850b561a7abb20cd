use governor::clock::Clock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::Quota;
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::trace;

/// Clock reading tokio's timer so paused/advanced test time drives the bucket
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    type Instant = Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now().into_std()
    }
}

type DirectLimiter =
    governor::RateLimiter<NotKeyed, InMemoryState, TokioClock, NoOpMiddleware<Instant>>;

/// Token bucket admitting `capacity` acquisitions per rolling 60 seconds.
///
/// The bucket starts full and regains one token every `60s / capacity`.
/// `acquire` never fails: it parks the caller until a token frees up.
/// Waiters queue on a fair mutex, so they are admitted in arrival order.
pub struct RateLimiter {
    limiter: DirectLimiter,
    clock: TokioClock,
    queue: Mutex<()>,
    capacity: NonZeroU32,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::per_minute(nonzero!(60u32))
    }
}

impl RateLimiter {
    pub fn per_minute(capacity: NonZeroU32) -> Self {
        let clock = TokioClock;
        Self {
            limiter: governor::RateLimiter::direct_with_clock(Quota::per_minute(capacity), &clock),
            clock,
            queue: Mutex::new(()),
            capacity,
        }
    }

    pub const fn capacity(&self) -> u32 {
        self.capacity.get()
    }

    /// Wait for a token and consume it
    pub async fn acquire(&self) {
        let _turn = self.queue.lock().await;
        loop {
            match self.limiter.check() {
                Ok(()) => return,
                Err(not_until) => {
                    let wait = not_until.wait_time_from(self.clock.now());
                    trace!(wait_ms = wait.as_millis() as u64, "rate limited, waiting");
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Consume a token only if one is available right now and nobody is
    /// queued ahead in `acquire`
    pub fn try_acquire(&self) -> bool {
        match self.queue.try_lock() {
            Ok(_turn) => self.limiter.check().is_ok(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_burst_up_to_capacity_is_immediate() {
        let limiter = RateLimiter::per_minute(nonzero!(3u32));
        let start = tokio::time::Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(1));
        assert!(!limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_past_capacity_waits_for_refill() {
        let limiter = RateLimiter::per_minute(nonzero!(2u32));
        limiter.acquire().await;
        limiter.acquire().await;

        let start = tokio::time::Instant::now();
        limiter.acquire().await;
        // one token every 30s at two per minute
        assert!(start.elapsed() >= Duration::from_secs(30));
        assert!(start.elapsed() <= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiters_are_served_in_arrival_order() {
        let limiter = Arc::new(RateLimiter::per_minute(nonzero!(1u32)));
        limiter.acquire().await;

        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for i in 0..3 {
            let limiter = limiter.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
                order.lock().unwrap().push(i);
            }));
            // let each waiter enqueue before spawning the next one
            tokio::task::yield_now().await;
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_acquire_does_not_jump_the_queue() {
        let limiter = Arc::new(RateLimiter::per_minute(nonzero!(1u32)));
        limiter.acquire().await;

        let waiter = tokio::spawn({
            let limiter = limiter.clone();
            async move { limiter.acquire().await }
        });
        tokio::task::yield_now().await;

        // the refilled token belongs to the parked waiter
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(!limiter.try_acquire());
        waiter.await.unwrap();
        assert!(!limiter.try_acquire());
    }
}
