//! Command dispatch.
//!
//! One-shot commands print a [`CommandResult`](crate::output::CommandResult)
//! envelope and report whether it was `ok`; `serve` runs until shutdown.

mod lookup;
mod refresh;
mod serve;
mod session;
mod status;

use chairside_protocol::LookupArgs;

use crate::cli::{Cli, Commands, SessionAction};
use crate::config::AppConfig;
use crate::error::{CliError, Result};
use crate::output::{OutputFormat, ResultBuilder, print_result};

impl Commands {
	pub fn name(&self) -> &'static str {
		match self {
			Commands::Serve { .. } => "serve",
			Commands::Lookup { .. } => "lookup",
			Commands::Refresh => "refresh",
			Commands::Status => "status",
			Commands::Session { action: SessionAction::Clear } => "session.clear",
		}
	}
}

/// Runs the parsed command. `Ok(false)` means a failure envelope was printed.
pub async fn dispatch(cli: Cli) -> Result<bool> {
	let mut config = AppConfig::load(&cli.config)?;
	config.apply(&cli.overrides());
	let format = cli.format;

	match cli.command {
		Commands::Serve { .. } => serve::run(config).await.map(|()| true),
		Commands::Lookup {
			branch,
			dob,
			first_name,
			last_name,
		} => {
			let args = LookupArgs {
				branch: Some(branch),
				dob: Some(dob),
				first_name: Some(first_name),
				last_name: Some(last_name),
			};
			lookup::run(config, args, format).await
		}
		Commands::Refresh => refresh::run(config, format).await,
		Commands::Status => status::run(&config, format),
		Commands::Session { action: SessionAction::Clear } => session::clear(&config, format),
	}
}

/// Prints `err` as a failure envelope for `command`.
pub fn print_error(command: &str, err: &CliError, format: OutputFormat) {
	let result = ResultBuilder::<()>::new(command).error(err.code(), err.to_string()).build();
	print_result(&result, format);
}
