use crate::preview::{run_preview, PreviewArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use norae_hybe::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "NORAE HYBE Ticketing",
    about = "Run the NORAE HYBE registration service or preview e-tickets locally",
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
    /// Work with e-tickets without sending anything
    Ticket {
        #[command(subcommand)]
        command: TicketCommand,
    },
}

#[derive(Subcommand, Debug)]
enum TicketCommand {
    /// Render an e-ticket PDF to a local file
    Preview(PreviewArgs),
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
        Command::Ticket {
            command: TicketCommand::Preview(args),
        } => run_preview(args),
    }
}
