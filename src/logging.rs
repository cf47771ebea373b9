use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILTER: &str = "info";
pub const DEFAULT_NOISE_FILTER: &str = "ort=warn";

/// Pick the filter directive: an explicit filter wins, then `RUST_LOG`, then
/// the `-v` count. Implicit filters keep ONNX Runtime's logging quiet.
pub fn select_log_filter(
    cli_filter: Option<&str>,
    rust_log_env: Option<&str>,
    verbose: u8,
) -> String {
    if let Some(filter) = cli_filter.filter(|f| !f.trim().is_empty()) {
        return filter.to_string();
    }
    if let Some(filter) = rust_log_env.filter(|f| !f.trim().is_empty()) {
        return filter.to_string();
    }
    let level = match verbose {
        0 => DEFAULT_LOG_FILTER,
        1 => "debug",
        _ => "trace",
    };
    format!("{level},{DEFAULT_NOISE_FILTER}")
}

/// Install a stderr `fmt` subscriber. Safe to call more than once; later
/// calls leave the first subscriber in place.
pub fn init(verbose: u8, cli_filter: Option<&str>) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = select_log_filter(cli_filter, rust_log.as_deref(), verbose);
    let env_filter = parse_env_filter_with_fallback(&filter);

    let subscriber = tracing_subscriber::registry().with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(env_filter),
    );

    if let Err(error) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!(
            "Failed to initialize tracing subscriber: {error}. Continuing without structured tracing."
        );
    }
}

fn parse_env_filter_with_fallback(filter: &str) -> EnvFilter {
    EnvFilter::try_new(filter).unwrap_or_else(|error| {
        eprintln!("Invalid log filter '{filter}': {error}. Falling back to '{DEFAULT_LOG_FILTER}'.");
        EnvFilter::new(DEFAULT_LOG_FILTER)
    })
}
