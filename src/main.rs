//! bark-nav - list a directory through a Bark panel
//!
//! Usage: bark-nav [PATH] [--focus NAME] [--sizes] [--state] [--save] [--restore]

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

use bark_panel::config::{load_panel_state, save_panel_state, Config};
use bark_panel::errors::AppResult;
use bark_panel::providers::ProviderRegistry;
use bark_panel::state::PanelController;

/// How long to wait for background work before giving up
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "bark-nav")]
#[command(about = "List a directory through a Bark panel", long_about = None)]
struct Args {
    /// Directory to open (default: current directory)
    #[arg(value_name = "PATH")]
    path: Option<String>,

    /// Entry to put the cursor on
    #[arg(long, value_name = "NAME")]
    focus: Option<String>,

    /// Calculate directory sizes before listing
    #[arg(long)]
    sizes: bool,

    /// Print the restorable panel state as JSON
    #[arg(long = "state")]
    print_state: bool,

    /// Save the panel state for a later --restore
    #[arg(long)]
    save: bool,

    /// Start from the saved panel state
    #[arg(long)]
    restore: bool,
}

/// Subscriber used while the configuration itself is loading
fn bootstrap_subscriber<W>(writer: W) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("warn"))
        .with_writer(writer)
        .finish()
}

/// Install the log subscriber: RUST_LOG wins over the configured filter
fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn start_directory(args: &Args) -> String {
    if let Some(path) = &args.path {
        return path.clone();
    }
    std::env::current_dir()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "/".to_string())
}

fn print_listing(panel: &PanelController) {
    panel.with_data(|data| {
        if let Some(dir) = data.directory() {
            println!("{}", dir);
        }
        let focused = data.focused_name();
        for entry in data.entries() {
            let marker = if Some(entry.name.as_str()) == focused { '>' } else { ' ' };
            let size = data.entry_size(&entry.name).unwrap_or(entry.size);
            if entry.is_dir {
                println!("{} {}/  {}", marker, entry.name, if entry.is_parent_entry() { String::new() } else { size.to_string() });
            } else {
                println!("{} {}  {}", marker, entry.name, size);
            }
        }
    });
}

fn run(args: Args, config: Config) -> AppResult<ExitCode> {
    let registry = Arc::new(ProviderRegistry::new());
    let panel = PanelController::new(&config, Arc::clone(&registry));

    let restored = args.restore
        && load_panel_state().is_some_and(|state| panel.load_restorable_state(&state));

    if restored {
        tracing::info!("restored saved panel state");
    } else {
        let directory = start_directory(&args);
        let code = panel.go_to_dir(&directory, registry.native(), args.focus.as_deref(), false);
        if !code.is_ok() {
            let reason = panel.with_data(|data| data.error.clone()).unwrap_or_else(|| code.to_string());
            eprintln!("bark-nav: {}", reason);
            return Ok(ExitCode::FAILURE);
        }
    }

    if args.sizes {
        let names: Vec<String> = panel.with_data(|data| data.entries().map(|e| e.name.clone()).collect());
        panel.calculate_sizes_of_items(&names);
    }
    if !panel.wait_idle(IDLE_TIMEOUT) {
        tracing::warn!("background work still running, printing what is loaded");
    }

    print_listing(&panel);

    let state = panel.encode_restorable_state();
    if args.print_state
        && let Some(state) = &state
    {
        println!("{}", serde_json::to_string_pretty(state)?);
    }
    if args.save {
        match &state {
            Some(state) => save_panel_state(state)?,
            None => tracing::warn!("panel location cannot be saved"),
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = tracing::subscriber::with_default(bootstrap_subscriber(std::io::stderr), Config::load);
    init_logging(&config);

    match run(args, config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("bark-nav: {}", e);
            ExitCode::FAILURE
        }
    }
}
