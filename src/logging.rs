use tracing_subscriber::{fmt, EnvFilter};

pub const DEFAULT_FILTER: &str = "foodgram=info,warp=info";

/// Installs the fmt subscriber. `RUST_LOG` overrides the default filter; `log` records are
/// forwarded as well.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    if fmt().with_env_filter(filter).try_init().is_err() {
        log::warn!("Logger already initialized");
    }
}
