//! aectl - agent engine control

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::{delete_command, deploy_command, list_command, send_command, Context};

/// aectl - deploy and manage agent engines
#[derive(Parser)]
#[command(name = "aectl")]
#[command(about = "◆ Deploy and manage agent engines from YAML profiles")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Profile name to use from the YAML file
    #[arg(long, global = true, default_value = "default")]
    profile: String,

    /// Path to the YAML profile file
    #[arg(short = 'f', long = "yaml-file", global = true)]
    yaml_file: Option<PathBuf>,

    /// Verbose logging and full error causes
    #[arg(long, global = true)]
    debug: bool,

    /// Module manifest backing instance_path and tool references
    #[arg(long, global = true, env = "AECTL_MODULES")]
    modules: Option<PathBuf>,

    /// Override the platform API endpoint
    #[arg(long, global = true, env = "AECTL_API_ENDPOINT")]
    api_endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy or update an agent engine from the selected profile
    Deploy {
        /// Resolve and look up, but change nothing
        #[arg(long)]
        dry_run: bool,
    },
    /// List deployed agent engines
    List,
    /// Send a message to a deployed agent engine
    Send {
        /// Message to send
        #[arg(short, long)]
        message: String,
        /// Display name of the agent engine (defaults to the profile's)
        #[arg(short, long)]
        display_name: Option<String>,
        /// Session to continue
        #[arg(short, long)]
        session_id: Option<String>,
        /// User id for the session
        #[arg(short, long, env = "USER")]
        user_id: Option<String>,
    },
    /// Delete a deployed agent engine
    Delete {
        /// Display name of the agent engine (defaults to the profile's)
        #[arg(short, long)]
        name: Option<String>,
        /// Also delete sessions and memories
        #[arg(long)]
        force: bool,
        /// Show what would be deleted
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let ctx = Context {
        profile: cli.profile,
        yaml_file: cli.yaml_file,
        modules: cli.modules,
        api_endpoint: cli.api_endpoint,
    };

    let result = match cli.command {
        Commands::Deploy { dry_run } => deploy_command(&ctx, dry_run).await,
        Commands::List => list_command(&ctx).await,
        Commands::Send {
            message,
            display_name,
            session_id,
            user_id,
        } => send_command(&ctx, message, display_name, session_id, user_id).await,
        Commands::Delete {
            name,
            force,
            dry_run,
        } => delete_command(&ctx, name, force, dry_run).await,
    };

    if let Err(e) = result {
        if cli.debug {
            eprintln!("Error: {:?}", e);
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}
