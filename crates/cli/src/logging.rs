use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber, writing to stderr.
///
/// `RUST_LOG` wins when set. Otherwise dependencies log at `warn` and the
/// service's own targets at `info`; `-v` lifts everything to `info`, `-vv`
/// and `-vvv` add `debug` and `trace` for the service targets.
pub fn init_logging(verbose: u8) {
	let directives = match verbose {
		0 => "warn,pairlink=info",
		1 => "info",
		2 => "info,pairlink=debug",
		_ => "debug,pairlink=trace",
	};
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_target(true)
		.with_ansi(std::io::stderr().is_terminal())
		.with_writer(std::io::stderr)
		.try_init();
}
