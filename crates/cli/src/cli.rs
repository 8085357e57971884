use clap::{Args, Parser, Subcommand};

/// Root CLI for the tabwire companion server.
#[derive(Parser, Debug)]
#[command(name = "tabwire")]
#[command(about = "Bridge JSON-RPC clients to a browser extension")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Run the companion server.
	Serve(ServeArgs),
	/// Print the tool catalog as JSON.
	Tools,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
	/// Address to bind.
	#[arg(long, default_value = "127.0.0.1")]
	pub host: String,

	/// Port carrying both the JSON-RPC endpoint and the extension bridge.
	#[arg(long, default_value_t = 8787)]
	pub port: u16,

	/// Seconds to wait for the extension to answer a bridged tool call.
	#[arg(long, value_name = "SECS", default_value_t = 30)]
	pub call_timeout: u64,
}
