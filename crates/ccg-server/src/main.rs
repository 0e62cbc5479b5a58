//! CyberClarityGlobal consent service — serves the cookie banner state to the site shell.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ccg_consent::{ConsentManager, DoNotTrack};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod routes;
mod state;

use state::AppState;

fn resolve_data_dir() -> PathBuf {
    std::env::var("CCG_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

/// Print the stored record for a data directory and the state a fresh load would pick.
fn print_status(data_dir: &Path) -> anyhow::Result<()> {
    if !data_dir.is_dir() {
        anyhow::bail!("Data directory {} does not exist", data_dir.display());
    }
    let config = ccg_core::ConsentConfig::from_env(data_dir)?;
    let store = ccg_store::open_store(&config);
    let manager = ConsentManager::load(
        store,
        DoNotTrack::from_signal(config.do_not_track.as_deref()),
    );

    println!("Storage:  {} ({})", config.storage, config.data_paths.root.display());
    println!("Banner:   {}", manager.state());
    match manager.stored_record() {
        Some(record) => {
            println!("Version:  {}", record.version);
            println!("Date:     {}", record.date);
            println!("Choices:  {}", serde_json::to_string(&record.choices)?);
        }
        None => println!("Choices:  none on file for the current version"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    // Handle CLI subcommands
    if args.len() > 1 {
        match args[1].as_str() {
            "--status" | "status" => {
                let data_dir = if args.len() > 2 {
                    PathBuf::from(&args[2])
                } else {
                    resolve_data_dir()
                };
                return print_status(&data_dir);
            }
            "--help" | "-h" | "help" => {
                println!("ccg-consent — cookie consent service");
                println!();
                println!("Usage: ccg-consent [command]");
                println!();
                println!("Commands:");
                println!("  (none)                   Start the server");
                println!("  status [data-dir]        Show the stored consent record");
                println!("  help                     Show this help message");
                println!();
                println!("Environment: CCG_DATA_DIR, CCG_STORAGE (file|sqlite|memory),");
                println!("             CCG_DO_NOT_TRACK, PORT, RUST_LOG");
                return Ok(());
            }
            _ => {
                eprintln!("Unknown command: {}. Use 'ccg-consent help' for usage.", args[1]);
                std::process::exit(1);
            }
        }
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let config = ccg_core::ConsentConfig::from_env(&data_dir)?;
    let port = config.port;

    let store = ccg_store::open_store(&config);
    let state = Arc::new(AppState::new(config, store));

    let app = routes::build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Consent service listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
