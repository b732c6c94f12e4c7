pub mod handlers;
pub mod limiter;
