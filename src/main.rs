use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod api;
mod app;
mod bot;
mod bridge;
mod config;
mod error;
mod handler;
mod logging;
mod server;
mod store;
mod tui;
mod ui;

use api::HttpTransport;
use app::App;
use bridge::FormBridge;
use config::Config;
use store::Store;

#[derive(Parser)]
#[command(name = "foodchat")]
#[command(about = "Food ordering chatbot: terminal client and backend server")]
struct Cli {
    /// Config file (defaults to <config dir>/foodchat/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the terminal client (default)
    Tui {
        /// Backend base URL
        #[arg(short, long)]
        server: Option<String>,
        /// Remember the server URL in the config file
        #[arg(long, requires = "server")]
        save: bool,
    },
    /// Run the backend server
    Serve {
        /// Address to listen on
        #[arg(short, long)]
        addr: Option<String>,
        /// SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Recreate the schema and seed the menu from a JSON file
    Setup {
        /// Menu file: [{"name": ..., "price": ...}, ...]
        #[arg(short, long)]
        menu: PathBuf,
        /// SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_ref())
        .context("Failed to load config")?;

    match cli.command.unwrap_or(Commands::Tui { server: None, save: false }) {
        Commands::Tui { server, save } => {
            if let Some(url) = server {
                config.server_url = Some(url);
                if save {
                    config.save(cli.config.as_ref())?;
                }
            }
            run_tui(&config).await
        }
        Commands::Serve { addr, db } => {
            logging::init_stderr();
            let db = db.unwrap_or_else(|| PathBuf::from(config.database_path()));
            let addr = addr.unwrap_or_else(|| config.listen_addr().to_string());

            let store = Store::open(&db)
                .with_context(|| format!("Failed to open database {}", db.display()))?;
            tracing::info!("Using database {}", db.display());
            server::serve(&addr, store).await
        }
        Commands::Setup { menu, db } => {
            logging::init_stderr();
            let db = db.unwrap_or_else(|| PathBuf::from(config.database_path()));

            let inserted = store::setup(&db, &menu)?;
            tracing::info!("Seeded {} menu items into {}", inserted, db.display());
            println!("Database {} ready with {} menu items.", db.display(), inserted);
            Ok(())
        }
    }
}

async fn run_tui(config: &Config) -> Result<()> {
    let log_path = logging::init_file(None)?;
    tracing::info!("Starting client against {}", config.server_url());

    let transport = HttpTransport::new(config.server_url())?;
    let bridge = FormBridge::new(Arc::new(transport));
    let mut app = App::new(bridge, config.server_url());

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event).await,
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    if let Err(e) = &result {
        tracing::error!("Client exited with error: {:#}", e);
        eprintln!("Error: {:#} (log: {})", e, log_path.display());
    }
    result
}
