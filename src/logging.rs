use tracing_subscriber::EnvFilter;

const SERVICE_FILTER: &str = "info,notelink=debug";
const CLI_FILTER: &str = "warn";

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Installs the global subscriber for the service; `RUST_LOG` overrides the filter.
pub fn init(json: bool) {
    let builder = tracing_subscriber::fmt().with_env_filter(filter(SERVICE_FILTER));
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Quieter logging on stderr so stdout carries only the result.
pub fn init_for_cli() {
    tracing_subscriber::fmt()
        .with_env_filter(filter(CLI_FILTER))
        .with_writer(std::io::stderr)
        .init();
}
