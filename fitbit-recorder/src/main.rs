use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use fitbit_auth::{authorize, CredentialStore, TokenAuthenticator};
use fitbit_recorder::{logging, FitbitWeightLogs, InfluxDbSink, Settings, SyncRunner};

#[derive(Parser)]
#[command(
    name = "fitbit-recorder",
    about = "Record Fitbit weight, body fat and BMI into InfluxDB"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Write log output to a file (default)
    #[arg(long, global = true, overrides_with = "no_log")]
    log: bool,

    /// Write log output to stderr instead of a file
    #[arg(long, global = true, overrides_with = "log")]
    no_log: bool,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Fetch and normalize, but do not write to InfluxDB
    #[arg(long, global = true)]
    dry_run: bool,

    /// Credential file override
    #[arg(long, global = true)]
    credentials: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Authorize this application and authenticate with Fitbit
    Authorize,
    /// Record the last week of weight logs
    RecordStatus,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let to_file = cli.log || !cli.no_log;
    let logging = logging::init_logging(to_file, cli.verbose)?;
    if let Some(path) = &logging.log_path {
        tracing::debug!("logging to {}", path.display());
    }

    let settings = Settings::new()?;
    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))?;

    let credentials_path = match cli.credentials {
        Some(path) => path,
        None => settings.credentials_path()?,
    };
    let store = CredentialStore::new(credentials_path);
    let authenticator = TokenAuthenticator::with_timeout(settings.timeout())?;

    match cli.command {
        Command::Authorize => {
            let stdin = std::io::stdin();
            let result =
                authorize(&store, &authenticator, stdin.lock(), std::io::stdout(), true).await;
            if let Err(e) = result {
                tracing::error!("authorization failed: {}", e);
                return Err(e.into());
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::RecordStatus => {
            let api = FitbitWeightLogs::new(settings.api_base_url.clone(), settings.timeout());
            let sink = InfluxDbSink::new(&settings.influxdb, settings.timeout())?;
            let runner = SyncRunner::new(api, authenticator, store, sink)
                .window(settings.window)
                .span(tracing::info_span!("record_status", dry_run = cli.dry_run));

            let report = runner.run(cli.dry_run).await;
            match report.failure {
                None => Ok(ExitCode::SUCCESS),
                Some(failure) => {
                    eprintln!("sync failed ({}): {}", failure.kind, failure.message);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}
