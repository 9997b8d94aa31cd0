use chairside_cli::cli::Cli;
use chairside_cli::{commands, logging};
use clap::Parser;
use tracing::error;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let command = cli.command.name();
	let format = cli.format;
	match commands::dispatch(cli).await {
		Ok(true) => {}
		Ok(false) => std::process::exit(1),
		Err(err) => {
			error!(target = "chairside", error = %err, "command failed");
			commands::print_error(command, &err, format);
			std::process::exit(1);
		}
	}
}
