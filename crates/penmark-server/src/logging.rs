//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Install the global `fmt` subscriber
///
/// `debug` forces the `debug` level; otherwise `RUST_LOG` applies, falling
/// back to `info`. A second call is a no-op.
pub fn init_logging(debug: bool) {
	let filter = if debug {
		EnvFilter::new("debug")
	} else {
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
	};
	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_target(false)
		.try_init();
}
