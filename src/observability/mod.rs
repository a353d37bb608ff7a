// Structured logging through tracing
// JSON lines on stdout, filtered by RUST_LOG

use anyhow::{Context, Result};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Filter used when RUST_LOG is not set
pub const DEFAULT_FILTER: &str = "eshop=info,tower_http=info";

/// Install the global JSON subscriber
pub fn init() -> Result<()> {
    let fmt_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_current_span(true)
        .with_span_list(false)
        .with_span_events(FmtSpan::CLOSE);

    // Example: RUST_LOG=eshop=debug,tower_http=warn
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .context("Failed to create tracing filter")?;

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// Span wrapping one HTTP request
#[inline]
pub fn request_span(method: &str, path: &str, request_id: u64) -> tracing::Span {
    tracing::info_span!(
        "request",
        method = method,
        path = path,
        request_id = request_id,
    )
}
