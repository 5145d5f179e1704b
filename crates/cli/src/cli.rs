use std::path::PathBuf;

use clap::{Parser, Subcommand};
use relive_primitives::UnitId;

#[derive(Parser, Debug)]
#[command(name = "relive")]
#[command(about = "Recompile units from source and swap them into a running host")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
	/// Config file (defaults to $RELIVE_CONFIG, then ./relive.toml)
	#[arg(long, short = 'c', global = true, value_name = "PATH")]
	pub config: Option<PathBuf>,

	/// Verbose logging
	#[arg(long, short = 'v', global = true)]
	pub verbose: bool,

	#[command(subcommand)]
	pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
	/// Print the resolved configuration and toolchain
	Check,
	/// Compile one unit without loading it
	Compile {
		/// Unit to compile, e.g. `demo.greeter`
		unit: UnitId,
	},
	/// Load units, then reload the unit named on each line of stdin
	Host {
		/// Units to load (defaults to the config's `units`)
		units: Vec<UnitId>,
	},
}
