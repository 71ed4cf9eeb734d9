use clap::{Args, Parser, Subcommand};

use pbx_provision::AppError;

use crate::demo::{run_demo, run_provision, DemoArgs, ProvisionArgs};
use crate::server;

#[derive(Parser, Debug)]
#[command(
    name = "PBX Provisioning Service",
    about = "Compile tenant voice-routing records into switch configuration and activate them",
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
    /// Run one compilation pass for a tenant and print the outcome as JSON
    Provision(ProvisionArgs),
    /// Provision the seed tenants into a local directory and narrate it
    Demo(DemoArgs),
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
        Command::Provision(args) => run_provision(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}
