use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise verbosity maps to a crate-scoped
/// filter so third-party noise stays out even at -vv.
pub fn init_logging(verbose: u8) {
	let default_filter = match verbose {
		0 => "restbreak=warn",
		1 => "restbreak=info",
		2 => "restbreak=debug",
		_ => "trace",
	};
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(verbose >= 2)
		.init();
}
