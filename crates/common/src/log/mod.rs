use tracing_subscriber::{EnvFilter, filter::LevelFilter, fmt, prelude::*};

fn default_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    }
}

/// Installs the global subscriber writing to stdout.
///
/// `RUST_LOG` overrides the default level. Keep the returned guard alive
/// until shutdown so buffered lines are flushed.
pub fn logging_stdout() -> impl Drop {
    let (nonblocking, guard) = tracing_appender::non_blocking(std::io::stdout());

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(nonblocking)
                .with_target(true)
                .with_file(cfg!(debug_assertions))
                .with_line_number(cfg!(debug_assertions)),
        )
        .with(
            EnvFilter::builder()
                .with_default_directive(default_level().into())
                .from_env_lossy(),
        )
        .init();

    guard
}
