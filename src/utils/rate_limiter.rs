use std::sync::Arc;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, Duration, Instant};

/// Throttle in front of the exchange-rate provider: bounds how many upstream
/// calls are in flight and spaces consecutive calls by a minimum delay.
#[derive(Clone)]
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    min_delay: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_concurrent: usize, min_delay: Duration) -> Self {
        RateLimiter {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            min_delay,
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// Wait for a slot. The slot is held until the returned guard is dropped.
    pub async fn acquire(&self) -> RateLimitGuard {
        let permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => Some(permit),
            Err(err) => {
                tracing::warn!("Upstream throttle closed, calling without a permit: {}", err);
                None
            }
        };

        if !self.min_delay.is_zero() {
            let mut last_request = self.last_request.lock().await;
            if let Some(last) = *last_request {
                let elapsed = last.elapsed();
                if elapsed < self.min_delay {
                    let wait_time = self.min_delay - elapsed;
                    tracing::debug!("Upstream throttle: waiting {:?}", wait_time);
                    sleep(wait_time).await;
                }
            }
            *last_request = Some(Instant::now());
        }

        RateLimitGuard { _permit: permit }
    }

    #[cfg(test)]
    pub fn close(&self) {
        self.semaphore.close();
    }

    #[cfg(test)]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

pub struct RateLimitGuard {
    _permit: Option<OwnedSemaphorePermit>,
}

impl Drop for RateLimitGuard {
    fn drop(&mut self) {
        tracing::trace!("Upstream permit released");
    }
}
