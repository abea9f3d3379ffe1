use anyhow::Result;
use clap::Parser;
use secuops_update::commands::{self, Services};
use secuops_update::config::ConfigOptions;
use std::path::PathBuf;

/// secuops-update - SecuOps client self-update
///
/// Check the SecuOps API for a newer client build, download it and hand it
/// to the system installer.
///
/// Examples:
///   secuops-update check                 # Is a newer build published?
///   secuops-update download --install    # Download it and launch the installer
///   secuops-update config set-api-url https://api.example.com
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API base URL for this run only (also via SECUOPS_API_URL)
    #[arg(long = "api-url", env = "SECUOPS_API_URL", value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// Directory holding downloaded builds
    #[arg(long = "download-dir", value_name = "PATH", global = true)]
    pub download_dir: Option<PathBuf>,

    /// Directory holding the saved preferences
    #[arg(long = "config-dir", value_name = "PATH", global = true)]
    pub config_dir: Option<PathBuf>,

    /// Program used to open downloaded builds (also via SECUOPS_INSTALLER)
    #[arg(
        long = "installer",
        env = "SECUOPS_INSTALLER",
        value_name = "PROGRAM",
        global = true
    )]
    pub installer: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Check whether a newer build is published
    Check(CheckArgs),

    /// Download the newest build
    Download(DownloadArgs),

    /// Launch the installer on a downloaded build
    Install(InstallArgs),

    /// Show or change saved settings
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    /// Print the resulting state as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args, Debug)]
pub struct DownloadArgs {
    /// Launch the installer once the download completes
    #[arg(long)]
    pub install: bool,
}

#[derive(clap::Args, Debug)]
pub struct InstallArgs {
    /// Downloaded build (a bare file name is looked up in the download directory)
    #[arg(value_name = "PATH")]
    pub path: PathBuf,
}

#[derive(clap::Subcommand, Debug)]
enum ConfigCommands {
    /// Print the effective settings
    Show,

    /// Save the API base URL for future runs
    SetApiUrl {
        #[arg(value_name = "URL")]
        url: String,
    },
}

impl Cli {
    fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    fn services(&self) -> Services {
        Services {
            options: ConfigOptions {
                config_dir: self.config_dir.clone(),
                download_dir: self.download_dir.clone(),
                api_url: self.api_url.clone(),
                platform: None,
            },
            installer: self.installer.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .init();
    let services = cli.services();

    match cli.command {
        Commands::Check(args) => commands::check(services, args.json).await?,
        Commands::Download(args) => commands::download(services, args.install).await?,
        Commands::Install(args) => commands::install(services, &args.path)?,
        Commands::Config(ConfigCommands::Show) => commands::show_config(services.options)?,
        Commands::Config(ConfigCommands::SetApiUrl { url }) => {
            commands::set_api_url(services.options, &url)?
        }
    }
    Ok(())
}
