use crate::config::LogFormat;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset
fn default_directives(format: LogFormat) -> &'static str {
    match format {
        LogFormat::Json => "info,shielded=info,wallet_demo=info",
        LogFormat::Pretty => "debug,shielded=debug,wallet_demo=debug",
    }
}

/// Install the global subscriber in the configured format
///
/// JSON lines for deployments, pretty multi-line output for development.
/// A second call leaves the first subscriber in place.
pub fn init_with_format(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(format)));

    let json = matches!(format, LogFormat::Json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .json()
    });
    let pretty = matches!(format, LogFormat::Pretty).then(|| {
        tracing_subscriber::fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .pretty()
    });

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(json)
        .with(pretty)
        .try_init();

    match installed {
        Ok(()) => tracing::info!(?format, "Logging initialized"),
        Err(e) => tracing::debug!("Logging already initialized: {}", e),
    }
}
