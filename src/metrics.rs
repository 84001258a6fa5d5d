use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, Histogram, register_counter, register_counter_vec, register_gauge,
    register_histogram,
};


lazy_static! {
    pub static ref CHAT_REQUESTS: Counter =
        register_counter!("gateway_chat_requests_total", "Total number of chat requests").unwrap();
    pub static ref ADMISSION_REJECTIONS: CounterVec = register_counter_vec!(
        "gateway_admission_rejections_total",
        "Chat requests rejected before reaching the provider",
        &["reason"]
    )
    .unwrap();
    pub static ref PROVIDER_ERRORS: CounterVec = register_counter_vec!(
        "gateway_provider_errors_total",
        "Failed chat-completion calls by error kind",
        &["kind"]
    )
    .unwrap();
    pub static ref PROVIDER_LATENCY: Histogram = register_histogram!(
        "gateway_provider_latency_seconds",
        "Chat-completion call latency in seconds"
    )
    .unwrap();
    pub static ref TRACKED_CLIENTS: Gauge =
        register_gauge!("gateway_tracked_clients", "Client keys currently held by the rate limiter").unwrap();
    pub static ref PRICING_REQUESTS: Counter =
        register_counter!("gateway_pricing_requests_total", "Total number of pricing requests").unwrap();
}
