//! tessera CLI - static asset build pipeline with a live-reload dev server.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tessera_tasks::TaskName;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Build front-end assets and serve them with live reload")]
#[command(version)]
pub struct Cli {
    /// Runs `default` when omitted
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to tessera.toml config file
    #[arg(short, long, default_value = "tessera.toml", global = true)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean, build everything, then serve and watch
    Dev,

    /// Run tasks by name
    Run {
        /// Task names, e.g. `css:main img`
        #[arg(required = true, value_name = "TASK")]
        tasks: Vec<String>,
    },

    /// Build every asset into the distribution directory
    Build,

    /// Start the development server
    Serve,

    /// Rebuild assets when their sources change
    Watch,

    /// Remove the output directories
    Clean,

    /// List tasks and their dependencies
    Tasks,

    /// Scaffold a project in the config file's directory
    Init {
        /// Overwrite existing files
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command.unwrap_or(Commands::Dev) {
        Commands::Dev => commands::run::run(&cli.config, &[TaskName::Default]).await?,
        Commands::Run { tasks } => {
            let names = tasks
                .iter()
                .map(|t| t.parse::<TaskName>())
                .collect::<Result<Vec<_>, _>>()?;
            commands::run::run(&cli.config, &names).await?;
        }
        Commands::Build => commands::run::run(&cli.config, &[TaskName::Dist]).await?,
        Commands::Serve => commands::run::run(&cli.config, &[TaskName::Webserver]).await?,
        Commands::Watch => commands::run::run(&cli.config, &[TaskName::Watch]).await?,
        Commands::Clean => commands::run::run(&cli.config, &[TaskName::Clean]).await?,
        Commands::Tasks => commands::tasks::run(),
        Commands::Init { yes } => commands::init::run(&cli.config, yes).await?,
    }

    Ok(())
}
