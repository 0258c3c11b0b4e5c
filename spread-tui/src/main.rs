/// Spread dashboard TUI
///
/// Browse the paginated pair listing, chart historical buy/sell spreads of the selected
/// pairs and follow them live over the GraphQL subscription.
mod app;
mod ui;

use std::{error::Error, io, sync::Arc, time::Duration};

use app::{App, KeyOutcome};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use spread_engine::{DashboardController, EngineConfig};
use spread_feed::{
    Action, DashboardDriver, DashboardSnapshot, FeedConfig, GraphQlHttpClient, WsPushChannel,
};
use tokio::sync::{mpsc, watch};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Get log file path from SPREAD_LOG_FILE env var (default: spread-tui.log)
fn get_log_file() -> String {
    std::env::var("SPREAD_LOG_FILE").unwrap_or_else(|_| "spread-tui.log".to_string())
}

/// Logs go to a file, the terminal belongs to the UI.
fn init_logging() -> Result<(), Box<dyn Error>> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(get_log_file())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging()?;

    // Install rustls crypto provider for wss:// endpoints
    let _ = rustls::crypto::ring::default_provider().install_default();

    let feed_config = FeedConfig::from_env();
    let engine_config = EngineConfig::from_env();
    info!(?feed_config, ?engine_config, "starting spread-tui");

    let controller = DashboardController::new(engine_config)?;
    let api = Arc::new(GraphQlHttpClient::new(&feed_config)?);
    let push = WsPushChannel::new(feed_config.clone());
    let (driver, mut snapshots) = DashboardDriver::new(controller, api, push, &feed_config);

    let (actions_tx, actions_rx) = mpsc::channel(64);
    let driver_task = tokio::spawn(driver.run(actions_rx));

    // Setup panic hook to restore terminal on crash
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic_info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &actions_tx, &mut snapshots).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    let _ = actions_tx.send(Action::Shutdown).await;
    let _ = driver_task.await;
    info!("spread-tui stopped");

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    actions: &mpsc::Sender<Action>,
    snapshots: &mut watch::Receiver<DashboardSnapshot>,
) -> Result<(), Box<dyn Error>> {
    let tick_rate = Duration::from_millis(200);
    let mut app = App::new();

    loop {
        let snapshot = snapshots.borrow_and_update().clone();
        app.clamp(&snapshot);
        terminal.draw(|f| ui::render_ui(f, &snapshot, &app))?;

        if !event::poll(tick_rate)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match app.handle_key(key.code, &snapshot, chrono::Utc::now()) {
            KeyOutcome::Quit => break,
            KeyOutcome::Dispatch(action) => {
                if actions.send(action).await.is_err() {
                    break;
                }
            }
            KeyOutcome::Ignored => {}
        }
    }

    Ok(())
}
