//! hub-commander - terminal client for GitHub repositories
//!
//! Run with `hub-commander` or `hub-commander --help` for usage.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use hub_commander::{
    APP_NAME, VERSION,
    config::{AppState, Config},
    git::{Git2Opener, WorkingCopyOpener},
    github::{GitHubClient, RepositoryHost},
    session::{SecretToken, filter_repositories},
    tui::App,
};

const TOKEN_ENV: &str = "GITHUB_TOKEN";

#[derive(Parser)]
#[command(name = APP_NAME)]
#[command(version = VERSION)]
#[command(about = "A terminal UI for managing GitHub repositories and their working copies")]
#[command(long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Personal access token (defaults to $GITHUB_TOKEN)
    #[arg(long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive TUI (default)
    Tui,

    /// List repositories of the authenticated user
    List {
        /// Only names containing this text (case-insensitive)
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Verify the token and show the profile it belongs to
    Whoami,

    /// Clone a repository
    Clone {
        /// Remote URL
        url: String,
        /// Target directory
        directory: PathBuf,
    },

    /// Show configuration
    Config {
        /// Initialize config file with defaults
        #[arg(long)]
        init: bool,
    },
}

fn setup_logging(debug: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
            .add_directive("git2=warn".parse()?)
            .add_directive("reqwest=warn".parse()?)
            .add_directive("hyper=warn".parse()?)
            .add_directive("tokio=warn".parse()?)
    };

    match log_file {
        // The TUI owns the terminal, so logs go to a file
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .wrap_err_with(|| format!("cannot open log file {}", path.display()))?;

            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(file).with_ansi(false).with_target(false))
                .with(filter)
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
                .with(filter)
                .init();
        }
    }

    Ok(())
}

/// Token from `--token`, then the environment
fn token_from(cli_token: Option<String>) -> Option<SecretToken> {
    cli_token
        .or_else(|| std::env::var(TOKEN_ENV).ok())
        .map(|t| SecretToken::new(t.trim()))
        .filter(|t| !t.is_empty())
}

fn require_token(cli_token: Option<String>) -> Result<SecretToken> {
    token_from(cli_token).ok_or_else(|| eyre!("no token given; pass --token or set {}", TOKEN_ENV))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            eprintln!("Warning: Failed to load config, using defaults: {}", e);
            Config::default()
        }),
    };
    let debug = cli.debug || config.debug;

    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Failed to create directories: {}", e);
    }

    match cli.command {
        None | Some(Commands::Tui) => {
            setup_logging(debug, Some(&config.log_file_path()?))?;
            info!("Starting {} v{}", APP_NAME, VERSION);

            let token = token_from(cli.token);
            let mut app = App::new(config, AppState::new(), token);
            app.run().await?;
        }

        Some(Commands::List { filter }) => {
            setup_logging(debug, None)?;

            let client = GitHubClient::new(&config, require_token(cli.token)?)?;
            let repositories = client.list_repos().await?;
            let shown = filter_repositories(&repositories, filter.as_deref().unwrap_or(""));

            if shown.is_empty() {
                println!("No repositories.");
            }
            for repo in shown {
                println!(
                    "{:<40} {:<8} {}",
                    repo.id.full_name(),
                    repo.visibility(),
                    repo.default_branch
                );
            }
        }

        Some(Commands::Whoami) => {
            setup_logging(debug, None)?;

            let client = GitHubClient::new(&config, require_token(cli.token)?)?;
            let user = client.current_user().await?;

            println!("Login: {}", user.login);
            println!("Name:  {}", user.name.as_deref().unwrap_or("-"));
            println!("Email: {}", user.email.as_deref().unwrap_or("-"));
        }

        Some(Commands::Clone { url, directory }) => {
            setup_logging(debug, None)?;

            let opener = Git2Opener::new(token_from(cli.token), None);
            let target = directory.clone();
            tokio::task::spawn_blocking(move || opener.clone_repo(&url, &target))
                .await
                .wrap_err("clone task failed")??;

            println!("Cloned into {}", directory.display());
        }

        Some(Commands::Config { init }) => {
            setup_logging(debug, None)?;

            let path = match cli.config {
                Some(path) => path,
                None => Config::config_file_path()?,
            };

            if init {
                config.save_to(&path)?;
                println!("Configuration initialized at {}", path.display());
            } else {
                println!("Configuration:");
                println!("{}", toml::to_string_pretty(&config)?);
                println!("\nConfig file: {}", path.display());
                println!("Data dir: {}", Config::data_dir()?.display());
                println!("Log file: {}", config.log_file_path()?.display());
            }
        }
    }

    Ok(())
}
