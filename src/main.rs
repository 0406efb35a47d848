mod api;
mod app;
mod clipboard;
mod config;
mod decode;
mod events;
mod keymap;
mod models;
mod relay;
mod session;
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::Backend, prelude::*};
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use api::RelayClient;
use app::App;
use clipboard::Osc52Clipboard;
use config::RelayMode;
use events::AppEvent;

#[derive(Parser)]
#[command(name = "promptpipe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay endpoint
    Serve {
        #[arg(short, long)]
        bind: Option<String>,

        #[arg(short, long, value_enum)]
        mode: Option<RelayMode>,
    },

    /// Open the terminal client
    Chat {
        #[arg(short, long)]
        relay_url: Option<String>,
    },
}

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind, mode } => {
            tracing_subscriber::registry()
                .with(env_filter(cli.verbose))
                .with(fmt::layer().with_target(false))
                .init();

            if let Some(bind) = bind {
                config.relay.bind_addr = bind;
            }
            if let Some(mode) = mode {
                config.relay.mode = mode;
            }
            relay::serve(config.relay).await
        }
        Commands::Chat { relay_url } => {
            // The terminal belongs to the UI, so logs go to a file.
            let log_path = config::get_log_path()?;
            let log_file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .with_context(|| format!("Failed to open log file {}", log_path.display()))?;
            tracing_subscriber::registry()
                .with(env_filter(cli.verbose))
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(log_file)))
                .init();

            if let Some(relay_url) = relay_url {
                config.client.relay_url = relay_url;
            }
            run_chat(config.client.relay_url).await
        }
    }
}

async fn run_chat(relay_url: String) -> Result<()> {
    let client = RelayClient::new(relay_url)?;
    let (tx, mut rx) = mpsc::unbounded_channel::<AppEvent>();
    let mut app = App::new(client.clone(), tx, Box::new(Osc52Clipboard));

    if client.health_check().await {
        info!(relay = %client.relay_url(), "relay reachable");
    } else {
        warn!(relay = %client.relay_url(), "relay not reachable");
        app.status = format!("Error: relay not reachable at {}", client.relay_url());
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app, &mut rx);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("Error: {err:?}");
    }

    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    event_rx: &mut mpsc::UnboundedReceiver<AppEvent>,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::render(f, app))?;

        // Drain generation events first so streamed text shows up promptly
        while let Ok(app_event) = event_rx.try_recv() {
            app.handle_event(app_event);
        }

        if event::poll(Duration::from_millis(16))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(command) = keymap::command_for(key.code, key.modifiers) {
                        app.dispatch(command);
                    }
                }
            }
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}
