use tracing_subscriber::EnvFilter;

/// Installs the global subscriber on stderr.
///
/// `RUST_LOG` wins; otherwise `-v` selects info and `-vv` debug, with
/// chairside's own targets at info by default.
pub fn init_logging(verbosity: u8) {
	let default = match verbosity {
		0 => "warn,chairside=info",
		1 => "info",
		_ => "debug",
	};
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

	let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}
