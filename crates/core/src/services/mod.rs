pub mod metrics;
pub mod price_gateway;
pub mod rate_limiter;
pub mod scheduler;
