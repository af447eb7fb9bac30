use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "restbreak")]
#[command(about = "Work/rest reminder that pauses browser playback during rest intervals")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Configuration file (JSON); defaults apply when omitted
	#[arg(short, long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Remote-debugging port probed first
	#[arg(short, long, global = true, value_name = "PORT")]
	pub port: Option<u16>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Run the work/rest cycle, pausing playback during rest intervals
	Run {
		/// Work interval in minutes
		#[arg(short, long, value_name = "MINUTES")]
		work: Option<u64>,

		/// Rest interval in seconds
		#[arg(short, long, value_name = "SECONDS")]
		rest: Option<u64>,
	},

	/// Connect to the browser debugging endpoint and report its state
	Connect,

	/// Pause playback in all matching tabs, once
	Pause,

	/// Resume playback in all matching tabs, once
	Resume,
}
