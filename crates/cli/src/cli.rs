use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{DEFAULT_CONFIG_FILE, Overrides};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "chairside")]
#[command(about = "Patient lookup service for the dental practice portal")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format for one-shot commands
	#[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Toon)]
	pub format: OutputFormat,

	/// Configuration file (missing file means defaults)
	#[arg(short, long, global = true, value_name = "FILE", default_value = DEFAULT_CONFIG_FILE)]
	pub config: PathBuf,

	/// Show the browser window
	#[arg(long, global = true)]
	pub headed: bool,

	/// Attach to a running browser instead of launching one (http://host:port or ws://...)
	#[arg(long, global = true, value_name = "URL")]
	pub cdp_endpoint: Option<String>,

	/// Session snapshot file
	#[arg(long, global = true, value_name = "FILE")]
	pub snapshot: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Run the HTTP service with the background session refresh
	Serve {
		/// Listen address, e.g. 0.0.0.0:3000
		#[arg(long, value_name = "ADDR")]
		bind: Option<String>,
	},

	/// Look up one patient and print the outcome
	Lookup {
		/// Office name or portal label, e.g. "stockton"
		#[arg(long)]
		branch: String,
		/// Date of birth as MM/DD/YYYY
		#[arg(long)]
		dob: String,
		#[arg(long)]
		first_name: String,
		#[arg(long)]
		last_name: String,
	},

	/// Validate or regenerate the session snapshot once
	Refresh,

	/// Show the stored session snapshot and its freshness
	Status,

	/// Session snapshot management
	Session {
		#[command(subcommand)]
		action: SessionAction,
	},
}

#[derive(Subcommand, Debug)]
pub enum SessionAction {
	/// Delete the stored snapshot
	Clear,
}

impl Cli {
	pub fn overrides(&self) -> Overrides {
		let bind = match &self.command {
			Commands::Serve { bind } => bind.clone(),
			_ => None,
		};
		Overrides {
			bind,
			headed: self.headed,
			cdp_endpoint: self.cdp_endpoint.clone(),
			snapshot_path: self.snapshot.clone(),
		}
	}
}
