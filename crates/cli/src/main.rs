use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use guestvault_cli::api_client::ApiClient;
use guestvault_cli::commands;
use guestvault_cli::commands::download::DownloadArgs;
use guestvault_cli::config::CliConfig;
use guestvault_cli::password;

#[derive(Parser)]
#[command(
    name = "guestvault",
    version,
    about = "guestvault CLI: encrypt, upload, download and preview files"
)]
struct Cli {
    /// Path to a config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Server endpoint, overriding the config file
    #[arg(long, global = true, env = "GUESTVAULT_ENDPOINT")]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file, encrypting it first when a password is given
    Upload {
        /// Path to the file to upload
        file_path: PathBuf,
        /// Encryption password; leave empty to upload in the clear
        #[arg(long, env = "GUESTVAULT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Prompt for the password instead
        #[arg(long, conflicts_with = "password")]
        prompt: bool,
        /// Override the detected MIME type
        #[arg(long = "type")]
        mime_type: Option<String>,
    },
    /// Download a file by id or link, decrypting it when needed
    Download {
        /// File id or detail URL (a `password` query parameter is honoured)
        target: String,
        #[arg(long, env = "GUESTVAULT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Directory to save into
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// List uploaded files, newest first
    List,
    /// Delete files by id (needs the admin token)
    Delete {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = CliConfig::load(cli.config.as_deref())?;
    if let Some(endpoint) = cli.endpoint {
        config.server.endpoint = endpoint;
    }
    let api = ApiClient::from_config(&config)?;

    match cli.command {
        Commands::Upload {
            file_path,
            password,
            prompt,
            mime_type,
        } => {
            let password = password::resolve(password, None, prompt)?;
            commands::upload::run(&api, &file_path, &password, mime_type.as_deref()).await?;
        }
        Commands::Download {
            target,
            password,
            output,
        } => {
            let output_dir = output.unwrap_or_else(|| config.storage.download_dir.clone());
            commands::download::run(
                &api,
                DownloadArgs {
                    target: &target,
                    password,
                    output_dir: &output_dir,
                },
            )
            .await?;
        }
        Commands::List => {
            commands::list::run(&api).await?;
        }
        Commands::Delete { ids } => {
            commands::delete::run(&api, &ids).await?;
        }
    }

    Ok(())
}
