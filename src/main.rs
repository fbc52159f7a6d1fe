use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

use growtwitter::api::client::HttpGateway;
use growtwitter::api::ApiGateway;
use growtwitter::app::{ApiEvent, App};
use growtwitter::config::Config;
use growtwitter::session::SessionStore;

#[derive(Parser, Debug)]
#[command(
    name = "growtwitter",
    about = "Terminal client for the Growtwitter social network",
    version
)]
struct Cli {
    /// Base URL of the API server; overrides the config file.
    #[arg(long, env = "GROWTWITTER_SERVER")]
    server: Option<String>,

    /// Read configuration from this file instead of the default location.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Minimum log level.
    #[arg(long = "log-level", value_enum, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,

    /// Write structured logs to this file. Logging is file-only because the
    /// terminal itself is busy drawing the UI.
    #[arg(long = "log-file", value_name = "PATH")]
    log_file: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_tracing(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

fn init_logging(level: LogLevel, file: Option<&Path>) -> Result<()> {
    let Some(path) = file else {
        return Ok(());
    };
    let file = std::fs::File::create(path)
        .with_context(|| format!("could not create log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_max_level(level.as_tracing())
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level, cli.log_file.as_deref())?;

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(server) = cli.server {
        config.base_url = server;
    }
    debug!(base_url = %config.base_url, "starting client");

    let session = Arc::new(SessionStore::open(SessionStore::default_path()?));
    let gateway: Arc<dyn ApiGateway> = Arc::new(HttpGateway::new(
        &config.base_url,
        Duration::from_secs(config.timeout_secs),
        Arc::clone(&session),
    ));

    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
    let mut app = App::new(session, gateway, events_tx);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, &mut app, &mut events_rx).await;

    // Always restore the terminal, even when the loop errored.
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    events_rx: &mut UnboundedReceiver<ApiEvent>,
) -> Result<()> {
    while !app.should_quit() {
        terminal.draw(|frame| app.render(frame))?;

        // Drain completed network calls first so key handling sees fresh
        // state, then poll the keyboard briefly to keep the loop ticking.
        while let Ok(api_event) = events_rx.try_recv() {
            app.handle_event(api_event);
        }

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }
    }
    Ok(())
}
