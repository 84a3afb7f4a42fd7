// Logging setup: runtime log level from env, optional JSON file output.
// Everything goes to stderr or the log file so stdout carries only the portfolio.
use std::env;
use std::fs;
use std::io;
use std::sync::OnceLock;
use tracing::Subscriber;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter,
};

static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

fn crate_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(format!("warn,fund_portfolio={}", level))
        .unwrap_or_else(|_| EnvFilter::new("warn,fund_portfolio=info"))
}

// Pretty human-readable output; span close events carry busy/idle timings for each generation.
fn console_layer<S, W>(writer: W, level: &str) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::Layer::new()
        .pretty()
        .with_writer(writer)
        .with_span_events(FmtSpan::CLOSE)
        .with_filter(crate_filter(level))
}

pub fn init_logging() -> io::Result<()> {
    let console_log_level = env::var("CONSOLE_LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string());
    let file_log_level = env::var("FILE_LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string());
    let log_to_file = env::var("LOG_TO_FILE").unwrap_or_else(|_| "false".to_string()) == "true";

    let registry = tracing_subscriber::registry().with(console_layer(io::stderr, &console_log_level));

    if log_to_file {
        let log_dir = std::path::Path::new("logs");
        fs::create_dir_all(log_dir)?;
        let file_name = format!("{}.log", chrono::Local::now().format("%Y-%m-%d_%H-%M-%S"));

        let file_appender = tracing_appender::rolling::never(log_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        FILE_GUARD.set(guard).ok();

        let file_layer = fmt::Layer::new()
            .json()
            .with_writer(non_blocking)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_filter(crate_filter(&file_log_level));

        // Already initialized (e.g. in tests) is not an error worth failing on
        registry.with(file_layer).try_init().ok();
    } else {
        registry.try_init().ok();
    }

    Ok(())
}
