//! Rate limiting logic and state management.

mod info;
mod limiter;
mod window;

pub use info::RateLimitInfo;
pub use limiter::{LimiterConfig, LimiterStats, RateLimiter};
pub use window::ClientWindow;
