mod health;
mod metrics;
mod chat;
mod pricing;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use chat::chat_handler;
pub use pricing::{pricing_handler, tier_handler};
