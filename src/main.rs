//! nodpi-supervisor: run and manage the nodpi proxy server.

mod commands;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nodpi-supervisor")]
#[command(about = "Run the nodpi proxy server with a live log view")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Data directory (default: $NODPI_HOME or the platform data dir)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Directory holding a platform-installed server binary (default: <root>/lib)
    #[arg(long, global = true, value_name = "DIR")]
    native_dir: Option<PathBuf>,

    /// Enable debug diagnostics on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server and follow its output until Ctrl-C
    Run {
        /// Log lines to keep on screen
        #[arg(short = 'n', long, default_value_t = 40)]
        lines: usize,
    },
    /// Stop a server left running by a previous session
    Stop,
    /// Show whether a recorded server is running
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the server command line for the current configuration
    Args,
    /// Install the server binary from the asset store
    Install,
    /// Show or change the proxy configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCmd,
    },
    /// Show or replace the domain blacklist
    Blacklist {
        #[command(subcommand)]
        cmd: BlacklistCmd,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ConfigCmd {
    /// Print the configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
    /// Set one configuration key
    Set {
        /// Key as written in the TOML file, e.g. `port`
        key: String,
        value: String,
    },
}

#[derive(Subcommand)]
enum BlacklistCmd {
    /// Print the blacklist
    Show,
    /// Replace the blacklist with the contents of FILE
    Import { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The live view owns stdout; keep stderr quiet unless asked
    let default_level = match (&cli.command, cli.verbose) {
        (_, true) => "debug",
        (Commands::Run { .. }, false) => "warn",
        _ => "info",
    };
    init_tracing(default_level);

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(
            shell,
            &mut Cli::command(),
            "nodpi-supervisor",
            &mut std::io::stdout(),
        );
        return Ok(());
    }

    let layout = commands::layout(cli.root, cli.native_dir)?;

    match cli.command {
        Commands::Run { lines } => commands::run::execute(layout, lines).await,
        Commands::Stop => commands::server::stop(&layout),
        Commands::Status { json } => commands::server::status(&layout, json),
        Commands::Args => commands::server::args(&layout),
        Commands::Install => commands::server::install(&layout),
        Commands::Config { cmd } => match cmd {
            ConfigCmd::Show => commands::config::show(&layout),
            ConfigCmd::Path => commands::config::path(&layout),
            ConfigCmd::Set { key, value } => commands::config::set(&layout, &key, &value),
        },
        Commands::Blacklist { cmd } => match cmd {
            BlacklistCmd::Show => commands::blacklist::show(&layout),
            BlacklistCmd::Import { file } => commands::blacklist::import(&layout, &file),
        },
        Commands::Completions { .. } => Ok(()),
    }
}

/// Diagnostics go to stderr; `RUST_LOG` overrides `default_level`.
fn init_tracing(default_level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
