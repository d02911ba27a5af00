mod commands;
mod progress;
mod utils;

use clap::{Parser, Subcommand};
use colored::Colorize;
use stackflow_cloud::Mode;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stackflow")]
#[command(about = "Provision a Lambda function behind API Gateway, and tear it down again", long_about = None)]
struct Cli {
    /// Delete the stack instead of creating it
    #[arg(short = 'd', long, global = true)]
    delete: bool,

    /// Stack file (defaults to stack.kdl discovery, then the built-in stack)
    #[arg(short = 'f', long, env = "STACKFLOW_FILE", global = true)]
    file: Option<PathBuf>,

    /// AWS region (overrides the stack's region)
    #[arg(long, env = "STACKFLOW_REGION", global = true)]
    region: Option<String>,

    /// AWS profile
    #[arg(long, env = "AWS_PROFILE", global = true)]
    profile: Option<String>,

    /// Run against an in-memory control plane instead of AWS
    #[arg(long, global = true)]
    dry_run: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the ordered actions without calling AWS (-d for delete order)
    Plan,
    /// Check the stack file
    Validate,
    /// Print the stack as a CloudFormation template
    Export {
        /// json or yaml
        #[arg(long, default_value = "json")]
        format: String,
    },
    /// Show the deployed resources and the endpoint
    Outputs {
        /// Print the discovered state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show version information
    Version,
}

/// Options shared by every command
pub struct GlobalOpts {
    pub file: Option<PathBuf>,
    pub region: Option<String>,
    pub profile: Option<String>,
    pub dry_run: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // logs go to stderr, results to stdout
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mode = if cli.delete { Mode::Delete } else { Mode::Create };
    let opts = GlobalOpts {
        file: cli.file,
        region: cli.region,
        profile: cli.profile,
        dry_run: cli.dry_run,
    };

    match cli.command {
        None => match mode {
            Mode::Create => commands::create::handle(&opts).await,
            Mode::Delete => commands::delete::handle(&opts).await,
        },
        Some(Commands::Plan) => commands::plan::handle(&opts, mode),
        Some(Commands::Validate) => commands::validate::handle(&opts),
        Some(Commands::Export { format }) => commands::export::handle(&opts, &format),
        Some(Commands::Outputs { json }) => commands::outputs::handle(&opts, json).await,
        Some(Commands::Version) => {
            println!("stackflow {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
