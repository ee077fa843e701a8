use clap::Parser;
use log::info;

use code_notes_auditor::{App, Cli, Config, FileStore, NoteStore};

fn initialize_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_secs()
        .format_module_path(true)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    initialize_logger();
    info!("Application starting up");

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> code_notes_auditor::Result<()> {
    let config = match cli.data_file {
        Some(path) => Config::with_data_file(path)?,
        None => Config::load()?,
    };

    // The collection is read once at startup and persisted after every
    // mutation
    let store = NoteStore::load(FileStore::open(&config.data_file));

    let mut app = App::new(store, config);
    app.run(cli.command).await
}
