use crate::infra::build_company_service;
use crate::server;
use clap::{Args, Parser, Subcommand};
use placement::config::AppConfig;
use placement::error::AppError;
use placement::telemetry;
use std::fs::File;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "Placement Portal",
    about = "Run the placement portal company service or import company sheets",
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
    /// Import companies from a spreadsheet CSV export
    Import(ImportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override the configured SQLite database path
    #[arg(long)]
    pub(crate) database: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// CSV file with one company per row
    pub(crate) csv: PathBuf,
    /// Signed token presented to the role gate
    #[arg(long, env = "APP_IMPORT_TOKEN")]
    pub(crate) token: Option<String>,
    /// Override the configured SQLite database path
    #[arg(long)]
    pub(crate) database: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Import(args) => run_import(args),
    }
}

fn run_import(args: ImportArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    if let Some(path) = args.database {
        config.database.path = path;
    }
    telemetry::init(&config.telemetry)?;

    let service = build_company_service(&config)?;
    let sheet = File::open(&args.csv)?;
    let report = service.import_sheet(args.token.as_deref(), sheet, Vec::new())?;
    info!(path = %args.csv.display(), "company sheet imported");

    println!(
        "Imported {} companies, {} rejected",
        report.imported.len(),
        report.failures.len()
    );
    for failure in &report.failures {
        let name = if failure.company_name.trim().is_empty() {
            "<unnamed>"
        } else {
            failure.company_name.as_str()
        };
        println!("  row {}: {} ({})", failure.index + 1, name, failure.reason);
    }

    Ok(())
}
