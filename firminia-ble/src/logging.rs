use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Logs go to stderr; RUST_LOG wins over the command line level.
pub fn setup_logging(default_level: &str) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| format!("invalid log filter {default_level:?}: {e}"))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}
