//! # Observability Infrastructure
//!
//! Structured logging for the generation core. The core itself only emits
//! `tracing` events (every skip/emit decision carries structured fields);
//! this module gives embedding binaries a subscriber setup matching that
//! output. Metrics and distributed tracing belong to the surrounding
//! control plane, not to this crate.

use crate::errors::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format for [`init_tracing`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Initialize the global tracing subscriber.
///
/// The filter is taken from `RUST_LOG` when set, falling back to the given
/// default directive (e.g. `"meshplane=debug"`). Returns an error when a
/// global subscriber is already installed.
pub fn init_tracing(default_directive: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive.to_string()));

    let result = match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_current_span(true))
            .try_init(),
    };

    result.map_err(|e| {
        crate::errors::Error::config(format!("Failed to install tracing subscriber: {}", e))
    })
}

/// Create a tracing span for one proxy's generation pass
#[macro_export]
macro_rules! generation_span {
    ($proxy_kind:expr, $proxy_name:expr) => {
        tracing::info_span!(
            "xds_generation",
            proxy_kind = %$proxy_kind,
            proxy_name = %$proxy_name
        )
    };
    ($proxy_kind:expr, $proxy_name:expr, $($field:tt)*) => {
        tracing::info_span!(
            "xds_generation",
            proxy_kind = %$proxy_kind,
            proxy_name = %$proxy_name,
            $($field)*
        )
    };
}
