//! Rate limiting middleware using token bucket algorithm

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use inkwell_common::errors::AppError;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Global (unkeyed) rate limiter shared by every request
#[derive(Clone)]
pub struct RateLimit {
    limiter: Arc<DefaultDirectRateLimiter>,
    requests_per_second: u32,
}

impl RateLimit {
    /// Build a limiter; `None` when `requests_per_second` is zero
    ///
    /// A zero burst falls back to the per-second rate.
    pub fn new(requests_per_second: u32, burst: u32) -> Option<Self> {
        let rate = NonZeroU32::new(requests_per_second)?;
        let burst = NonZeroU32::new(burst).unwrap_or(rate);

        let quota = Quota::per_second(rate).allow_burst(burst);

        Some(Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            requests_per_second,
        })
    }

    fn check(&self) -> Result<(), AppError> {
        self.limiter.check().map_err(|_| AppError::RateLimited {
            limit: self.requests_per_second,
        })
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(limit): State<RateLimit>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    limit.check()?;
    Ok(next.run(request).await)
}
