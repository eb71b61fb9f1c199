use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod output;
mod storage;
mod watch;

use output::Output;

#[derive(Parser)]
#[command(name = "bzc")]
#[command(version)]
#[command(about = "CLI for Campus Bazaar buyer/seller chats")]
#[command(long_about = "A command-line client for Campus Bazaar marketplace chats.\n\nProcesses sharing a data directory see each other's messages live.")]
struct Cli {
    /// Output in JSON format (for agents/scripts)
    #[arg(short, long, global = true)]
    json: bool,

    /// Data directory (default: platform data dir/bzc)
    #[arg(long, global = true, env = "BZC_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in as a marketplace user
    Login {
        /// User id
        user_id: String,
        /// Display name
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Sign out and clear all data
    Logout,

    /// Show current identity
    Whoami,

    /// Contact the seller of a listing (reuses an existing chat)
    Contact {
        /// Product id of the listing
        product_id: String,
        /// Seller user id
        seller_id: String,
        /// Listing title shown in the chat list
        #[arg(short, long)]
        title: Option<String>,
    },

    /// List chats, newest first
    Chats,

    /// Read messages from a chat
    Read {
        /// Chat ID
        chat_id: String,
        /// Maximum number of messages to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Send a message
    Send {
        /// Chat ID
        chat_id: String,
        /// Message content
        message: String,
    },

    /// Listen for new messages
    Listen {
        /// Specific chat ID (optional, listens to the chat list if not specified)
        #[arg(short, long)]
        chat: Option<String>,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("BZC_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let output = Output::new(cli.json);

    let result = run(cli, &output).await;

    if let Err(e) = result {
        output.error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: &Output) -> anyhow::Result<()> {
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?
            .join("bzc"),
    };

    std::fs::create_dir_all(&data_dir)?;
    let config = config::Config::load(&data_dir)?;

    match cli.command {
        Commands::Login { user_id, name } => {
            commands::identity::login(&user_id, name.as_deref(), &config, output).await
        }
        Commands::Logout => commands::identity::logout(&data_dir, output).await,
        Commands::Whoami => commands::identity::whoami(&config, output).await,
        Commands::Contact {
            product_id,
            seller_id,
            title,
        } => {
            commands::chat::contact(
                &product_id,
                &seller_id,
                title.as_deref(),
                &data_dir,
                &config,
                output,
            )
            .await
        }
        Commands::Chats => commands::chat::list(&data_dir, &config, output).await,
        Commands::Read { chat_id, limit } => {
            commands::message::read(&chat_id, limit, &data_dir, &config, output).await
        }
        Commands::Send { chat_id, message } => {
            commands::message::send(&chat_id, &message, &data_dir, &config, output).await
        }
        Commands::Listen { chat } => {
            commands::message::listen(chat.as_deref(), &data_dir, &config, output).await
        }
    }
}
