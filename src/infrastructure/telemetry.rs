use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber for an embedding binary or test run.
///
/// `default_filter` applies when `RUST_LOG` is not set, e.g.
/// `"finledger=debug"`.
pub fn init(default_filter: &str) {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();
}
