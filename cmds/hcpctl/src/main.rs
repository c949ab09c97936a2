use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use hcpctl::{
	commands::{self, util::BrokenPipeGuard},
	executor::ExecuteError,
	telemetry,
};

/// Exit status for runs stopped by Ctrl-C.
const EXIT_CANCELLED: u8 = 130;

#[derive(Parser)]
#[command(name = "hcpctl")]
#[command(about = "Create hosted clusters on a management cluster", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
	/// Log level (trace, debug, info, warn, error). Overrides RUST_LOG
	#[arg(long, global = true)]
	log_level: Option<tracing::Level>,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Create hosted cluster resources
	Create(commands::create::CreateArgs),

	/// Show the optional APIs served by the management cluster
	Capabilities(commands::capabilities::CapabilitiesArgs),

	/// Render control plane component workloads
	Render(commands::render::RenderArgs),
}

fn run(command: Commands) -> Result<()> {
	let stdout = BrokenPipeGuard::new(std::io::stdout());

	match command {
		Commands::Create(args) => commands::create::run(args, stdout),
		Commands::Capabilities(args) => commands::capabilities::run(args, stdout),
		Commands::Render(args) => commands::render::run(args, stdout),
	}
}

fn main() -> ExitCode {
	let cli = Cli::parse();

	let _telemetry = match telemetry::init(cli.log_level) {
		Ok(guard) => guard,
		Err(e) => {
			eprintln!("Error: initializing telemetry: {e:#}");
			return ExitCode::FAILURE;
		}
	};

	match run(cli.command) {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			let cancelled = e
				.chain()
				.filter_map(|cause| cause.downcast_ref::<ExecuteError>())
				.any(ExecuteError::is_cancelled);
			eprintln!("Error: {e:?}");
			if cancelled {
				ExitCode::from(EXIT_CANCELLED)
			} else {
				ExitCode::FAILURE
			}
		}
	}
}
