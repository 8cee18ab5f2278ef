//! Rate limiting and delivery middleware for Herald.
//!
//! Everything outbound flows through [`DeliveryMiddleware::deliver`]:
//! payload validation, per-channel fixed-window rate limiting, bounded
//! retries with exponential backoff, at most one fallback hop, options
//! splitting, and paced bulk sends. Adapters below this layer are
//! single-attempt; callers above it never see a panic — failures come back
//! as [`DeliveryResult`] values.

pub mod middleware;
pub mod rate_limiter;

pub use middleware::{DeliveryContext, DeliveryError, DeliveryMiddleware, DeliveryResult};
pub use rate_limiter::{RateLimiter, WindowQuota, DEFAULT_POLL_INTERVAL};
