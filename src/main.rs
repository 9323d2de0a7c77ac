mod app;
mod catalog;
mod config;
mod constants;
mod decode;
mod display;
mod graphics;
mod image_cache;
mod input;
mod loader;
mod pipeline;
mod queue;
mod search;
mod theme;
mod ui;
mod watchlist;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use ratatui::{
  DefaultTerminal,
  crossterm::event::{self, Event, KeyEvent, KeyEventKind},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use app::{App, PosterState};
use catalog::{CatalogClient, HttpTransport, Transport};
use config::Config;
use constants::constants;
use decode::RasterDecoder;
use display::CliDisplayMode;
use graphics::Renderer;
use loader::FrameWaker;
use pipeline::Pipeline;
use watchlist::WatchList;

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// Display mode: 'auto', 'kitty', 'sixel', 'direct', or 'ascii' (default: auto-detect)
  #[arg(short, long, default_value = "auto")]
  display_mode: CliDisplayMode,

  /// Catalog API key (falls back to `api_key` in prefs.toml)
  #[arg(long, env = "REEL_API_KEY", hide_env_values = true)]
  api_key: Option<String>,

  /// Directory for log files (default: <data dir>/logs)
  #[arg(long)]
  log_dir: Option<PathBuf>,

  /// Print shell completions and exit
  #[arg(long, value_name = "SHELL")]
  completions: Option<Shell>,
}

// --- Logging ---

/// Daily-rolling file logs. The TUI owns stdout, so nothing goes to the terminal.
/// The returned guard must live until exit or buffered lines are lost.
fn init_logging(logs_dir: &Path) -> Result<WorkerGuard> {
  use tracing_subscriber::{EnvFilter, fmt, prelude::*};

  std::fs::create_dir_all(logs_dir)
    .with_context(|| format!("Failed to create log directory {}", logs_dir.display()))?;

  let file_appender = tracing_appender::rolling::daily(logs_dir, "reel.log");
  let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,reel=debug"));

  tracing_subscriber::registry()
    .with(env_filter)
    .with(fmt::layer().with_writer(non_blocking).with_ansi(false).with_target(true).with_thread_names(true))
    .init();

  Ok(guard)
}

// --- Frame Loop ---

/// Wait up to one frame for a key press, in short slices so a loader wake
/// cuts the wait short. `None` means "redraw now".
fn wait_for_input(waker: &FrameWaker) -> Result<Option<KeyEvent>> {
  let c = constants();
  let deadline = Instant::now() + c.frame_poll();
  loop {
    if waker.take() {
      return Ok(None);
    }
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
      return Ok(None);
    }
    if event::poll(remaining.min(c.input_slice())).context("Failed to poll terminal events")? {
      return match event::read().context("Failed to read terminal event")? {
        Event::Key(key) if key.kind == KeyEventKind::Press => Ok(Some(key)),
        _ => Ok(None),
      };
    }
  }
}

/// Keep terminal-drawn posters in step with the last draw.
fn sync_graphics<T: Transport>(app: &App<T>, renderer: &mut Renderer) -> Result<()> {
  if !renderer.mode().uses_graphics_protocol() {
    return Ok(());
  }
  match (app.poster_area, app.poster_state()) {
    (Some(area), PosterState::Ready(id)) => renderer.place(id, area),
    _ => renderer.clear(),
  }
}

async fn frame_loop<T: Transport>(terminal: &mut DefaultTerminal, app: &mut App<T>, renderer: &mut Renderer) -> Result<()> {
  loop {
    app.poll().await;
    app.check_pending(&mut *renderer);
    app.expire_error();

    terminal.draw(|frame| ui::ui(frame, &mut *app, &mut *renderer))?;
    sync_graphics(app, renderer)?;

    if let Some(key) = wait_for_input(app.pipeline.waker())? {
      input::handle_key_event(app, key).await?;
    }

    if app.should_quit {
      break;
    }
  }
  Ok(())
}

async fn run<T: Transport>(terminal: &mut DefaultTerminal, mut app: App<T>, mut renderer: Renderer) -> Result<()> {
  let result = frame_loop(terminal, &mut app, &mut renderer).await;
  if let Err(e) = renderer.delete_all() {
    warn!(err = %e, "graphics: cleanup failed");
  }
  app.shutdown().await;
  result
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  if let Some(shell) = args.completions {
    clap_complete::generate(shell, &mut Args::command(), env!("CARGO_PKG_NAME"), &mut std::io::stdout());
    return Ok(());
  }

  let data_dir = config::project_dirs().map_or_else(|| PathBuf::from("."), |dirs| dirs.data_dir().to_path_buf());
  let _log_guard = init_logging(&args.log_dir.clone().unwrap_or_else(|| data_dir.join("logs")))?;
  info!(version = env!("CARGO_PKG_VERSION"), "reel starting");

  let config_path = config::config_file();
  let config = config_path.as_deref().map(Config::load_from).unwrap_or_default();
  let api_key = args
    .api_key
    .clone()
    .or_else(|| config.api_key.clone())
    .filter(|key| !key.trim().is_empty())
    .context("No catalog API key: pass --api-key, set REEL_API_KEY, or add api_key to prefs.toml")?;

  let client = CatalogClient::new(
    HttpTransport::catalog().context("Failed to build catalog HTTP client")?,
    HttpTransport::images().context("Failed to build image HTTP client")?,
    api_key,
  );
  let pipeline = Pipeline::start(Arc::new(client), RasterDecoder, FrameWaker::default())?;
  let app = App::new(pipeline, WatchList::new(data_dir.join("users")), config, config_path);

  let display_mode = display::resolve_display_mode(args.display_mode);
  info!(mode = display_mode.label(), "display mode resolved");

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  let result = run(&mut terminal, app, Renderer::new(display_mode)).await;
  ratatui::restore();
  if let Err(e) = &result {
    tracing::error!(err = %format!("{:#}", e), "reel exited with error");
  }
  result
}
