use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Parser)]
#[command(name = "refactor-studio")]
#[command(about = "Editor companion for generated refactoring exercises", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Workspace folder to search for the project")]
    workspace: Option<PathBuf>,

    #[arg(long, global = true, help = "Root URL of the exercise backend")]
    service_url: Option<String>,

    #[arg(long, global = true, help = "Per-request timeout in seconds")]
    timeout_secs: Option<u64>,

    #[arg(long, global = true, help = "Enable verbose debug output")]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Serve the panel protocol as JSON lines on stdin/stdout")]
    Panel,

    #[command(about = "Generate an exercise and write it into the project")]
    Generate {
        #[arg(long, help = "Domain the exercise is set in, e.g. Banking")]
        topic: String,

        #[arg(long = "smell", help = "Code smell to plant; repeat for several")]
        smells: Vec<String>,
    },

    #[command(about = "Send a solution file for review")]
    Review {
        #[arg(long, help = "Solution file, relative to the project root or absolute")]
        file: PathBuf,

        #[arg(long = "smell", help = "Code smell the solution should remove; repeat for several")]
        smells: Vec<String>,

        #[arg(long, help = "File holding the test run output")]
        test_results: Option<PathBuf>,
    },

    #[command(about = "Print the detected project root and entry point")]
    Locate,

    #[command(about = "Print the fenced code blocks found in a markdown file")]
    Extract {
        #[arg(help = "Markdown file to read")]
        file: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli::Config {
        verbose: cli.verbose,
        workspace: cli.workspace,
        service_url: cli.service_url,
        timeout_secs: cli.timeout_secs,
    };

    match cli.command {
        Commands::Panel => {
            cli::panel(&config).await?;
        }
        Commands::Generate { topic, smells } => {
            cli::generate(topic, smells, &config).await?;
        }
        Commands::Review {
            file,
            smells,
            test_results,
        } => {
            cli::review(file, smells, test_results, &config).await?;
        }
        Commands::Locate => {
            cli::locate(&config)?;
        }
        Commands::Extract { file } => {
            cli::extract(file, &config)?;
        }
    }

    Ok(())
}
