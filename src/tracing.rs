use tracing_subscriber::{EnvFilter, FmtSubscriber};

// Developer diagnostics go through `tracing`, written to stderr and filtered
// by the TRACE env var (off when unset).
//
// Examples:
//   TRACE=debug                  everything at debug
//   TRACE=acbtally::portfolio=trace   just the engine, very loud
pub fn setup_tracing() {
    let subscriber = FmtSubscriber::builder()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_env("TRACE"))
        .finish();

    // Errors only if a subscriber was already installed, which is fine.
    let _ = tracing::subscriber::set_global_default(subscriber);
}
