use clap::{Args, Parser, Subcommand};
use washplan::error::AppError;

use crate::demo::{run_demo, run_roster_check, DemoArgs, RosterCheckArgs};
use crate::server;

#[derive(Parser, Debug)]
#[command(
    name = "Hostel Wash Orchestrator",
    about = "Run and demonstrate the hostel wash-service lifecycle engine from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Inspect a roster CSV export before uploading it
    Roster {
        #[command(subcommand)]
        command: RosterCommand,
    },
    /// Run an end-to-end CLI demo covering requests, weighing, and promotion
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum RosterCommand {
    /// Parse a roster CSV and report what an import would enroll
    Check(RosterCheckArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Roster {
            command: RosterCommand::Check(args),
        } => run_roster_check(args),
        Command::Demo(args) => run_demo(args),
    }
}
