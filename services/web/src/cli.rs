use crate::infra::open_service;
use crate::server;
use clap::{Args, Parser, Subcommand};
use job_board::config::AppConfig;
use job_board::error::AppError;
use job_board::telemetry;

#[derive(Parser, Debug)]
#[command(
    name = "Job Board",
    about = "Run the job board web service and its setup commands",
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
    /// Create the Employer and Applicant groups if they are missing
    InitGroups,
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
        Command::InitGroups => init_groups(),
    }
}

fn init_groups() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let service = open_service(&config.storage)?;
    for provision in service.ensure_role_groups()? {
        println!("{provision}");
    }
    Ok(())
}
