mod view;

use std::path::PathBuf;
use std::process::ExitCode;
use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use filebeam_client::config::DEFAULT_CONFIG_FILE;
use filebeam_client::{BeamClient, ClientConfig};

#[derive(Parser)]
#[command(name = "filebeam", version, about = "Share files through a FileBeam server")]
struct Cli {
    /// TOML config file, ignored when missing
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Overrides `server` from the config file
    #[arg(long, env = "FILEBEAM_SERVER")]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the files currently shared on the server
    List,
    /// Upload one file, Ctrl-C cancels
    Upload {
        #[arg(help = "Path to the file to upload")]
        file: Option<PathBuf>,

        /// Upload password, falls back to `password` from the config file
        #[arg(long, env = "FILEBEAM_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("filebeam_client=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = ClientConfig::load(&cli.config)?;
    if let Some(server) = cli.server {
        config.server = server;
        config.server_url()?;
    }

    let client = BeamClient::new(&config).context("Failed to set up client")?;

    let code = match cli.command {
        Commands::List => view::list(&client).await,
        Commands::Upload { file, password } => {
            let password = password.or_else(|| config.password.clone()).unwrap_or_default();
            view::upload(&client, file, password).await?
        }
    };

    client.shutdown().await?;
    Ok(code)
}
