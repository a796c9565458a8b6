use std::path::{Path, PathBuf};
use std::process;

use chrono::Local;
use clap::{Parser, Subcommand};

mod compare;
mod config;
mod driver;
mod report;
mod runner;
mod server;
mod validator;

use config::{RunConfig, TestConfig};

/// Visual regression testing: old vs new deployment, section by section.
#[derive(Parser)]
#[command(name = "sitediff")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Page/selector/URL configuration file (.json or .yaml) - used when no
    /// subcommand specified
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Root directory runs are written under
    #[arg(short, long, global = true, default_value = "testOutput")]
    output: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture and compare all configured pages (default behavior)
    Run {
        /// Page/selector/URL configuration file (.json or .yaml)
        #[arg(short, long)]
        config: PathBuf,

        /// Root directory runs are written under
        #[arg(short, long, default_value = "testOutput")]
        output: PathBuf,
    },
    /// Serve the report tree with live reload
    Serve {
        /// Directory containing testOutput and the shared stylesheet
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// Port to run the server on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sitediff=info,warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(config_path: &Path, output: &Path) -> anyhow::Result<()> {
    let config = TestConfig::load(config_path)?;
    let run_config = RunConfig::new(config, output, Local::now());
    let run_dir = run_config.run_dir();
    runner::run(run_config).await?;
    println!("Run complete; reports under {}", run_dir.display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run { config, output }) => {
            run(&config, &output).await?;
            // The driver keeps helper processes alive; exit explicitly once
            // every engine is done.
            process::exit(0);
        }
        Some(Commands::Serve { root, port }) => {
            server::serve(&root, port).await?;
        }
        None => {
            // Default behavior: run if a config is provided
            if let Some(config) = cli.config {
                run(&config, &cli.output).await?;
                process::exit(0);
            } else {
                println!("sitediff: no config specified. Use --help for usage.");
            }
        }
    }

    Ok(())
}
