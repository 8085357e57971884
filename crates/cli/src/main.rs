use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tabwire_cli::{
	bridge::ExtensionBridge,
	cli::{Cli, Commands},
	http::{self, AppState},
	logging,
};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	if let Err(err) = run(cli).await {
		eprintln!("error: {err:#}");
		std::process::exit(1);
	}
}

async fn run(cli: Cli) -> Result<()> {
	match cli.command {
		Commands::Serve(args) => {
			let bridge = ExtensionBridge::new(Duration::from_secs(args.call_timeout));
			let state = AppState::new(bridge);
			http::run_server(&args.host, args.port, state).await
		}
		Commands::Tools => {
			let catalog = serde_json::to_string_pretty(&tabwire_protocol::tool_descriptors())?;
			println!("{catalog}");
			Ok(())
		}
	}
}
