use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub const DEFAULT_FILTER: &str = "starwatch=debug,tower_http=debug,axum=debug,info";

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over [`DEFAULT_FILTER`] when it is set.
pub fn build_subscriber() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();
}
