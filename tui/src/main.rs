mod app;
mod ui;
mod worker;

use std::io::{self, Stdout};
use std::time::Duration;

use anyhow::{Context, Result};
use basalam_client::{ClientConfig, Store};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::app::{AppState, Msg};

const STATE_FILE: &str = "panel-state.json";
const LOG_FILE: &str = "panel.log";
const TICK: Duration = Duration::from_millis(200);

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let cfg = ClientConfig::from_env();
    let store = Store::open(STATE_FILE);
    let token = match store.load_session().await {
        Ok(token) => token,
        Err(err) => {
            warn!(target: "main", "stored session unreadable, starting logged out: {}", err);
            None
        }
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut app = AppState::new(cfg, store, token, tx.clone())?;
    spawn_input_thread(tx);

    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("enter alternate screen")?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout)).context("create terminal")?;

    let result = run(&mut terminal, &mut app, &mut rx).await;

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    result
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(LOG_FILE)
        .with_context(|| format!("open log file: {LOG_FILE}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(file)
        .with_ansi(false)
        .init();
    Ok(())
}

/// Terminal input is blocking; a plain thread forwards key presses into the
/// async message loop.
fn spawn_input_thread(tx: UnboundedSender<Msg>) {
    std::thread::spawn(move || loop {
        match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                if tx.send(Msg::Key(key)).is_err() {
                    return;
                }
            }
            Ok(_) => {}
            Err(err) => {
                warn!(target: "main", "input read failed: {}", err);
                return;
            }
        }
    });
}

async fn run(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut AppState,
    rx: &mut mpsc::UnboundedReceiver<Msg>,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, app)).context("draw frame")?;

        match tokio::time::timeout(TICK, rx.recv()).await {
            Ok(Some(msg)) => app.update(msg),
            Ok(None) => break,
            Err(_) => app.update(Msg::Tick),
        }
        // apply everything already queued before the next draw
        while let Ok(msg) = rx.try_recv() {
            app.update(msg);
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}
