use ratatui::{layout::Rect, widgets::ListState};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogError, CatalogItem, Transport};
use crate::config::Config;
use crate::constants::constants;
use crate::image_cache::{ImageStatus, TextureId, TextureUploader};
use crate::input::TextInput;
use crate::pipeline::{FrameEvent, Pipeline};
use crate::search::SearchCompletion;
use crate::theme::{self, THEMES};
use crate::watchlist::WatchList;

// --- Messages ---

pub const MSG_SEARCHING: &str = "Searching…";
pub const MSG_NO_RESULTS: &str = "No movies found. Please try another search.";
pub const MSG_CONNECTION: &str = "Connection error occurred. Please check your internet connection and try again.";
pub const MSG_DETAIL_FAILED: &str = "Failed to fetch movie details. Please try again.";
pub const MSG_ALREADY_LISTED: &str = "Movie is in watch list";
pub const MSG_NOT_LISTED: &str = "The movie is not on watch list";

fn detail_error_message(err: &CatalogError) -> &'static str {
  match err {
    CatalogError::Connection(_) => MSG_CONNECTION,
    _ => MSG_DETAIL_FAILED,
  }
}

// --- Types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
  Title,
  Year,
  Results,
  WatchList,
  Login,
}

/// What the poster area should show for the selected movie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PosterState {
  Unavailable,
  Loading,
  Creating,
  Ready(TextureId),
}

impl PosterState {
  pub fn label(self) -> &'static str {
    match self {
      PosterState::Unavailable => "Image not available",
      PosterState::Loading => "Image is still loading…",
      PosterState::Creating => "Image loaded, creating texture…",
      PosterState::Ready(_) => "",
    }
  }
}

pub struct App<T: Transport> {
  pub title: TextInput,
  pub year: TextInput,
  pub login: TextInput,
  pub mode: AppMode,
  /// Where Esc at the login prompt returns to.
  login_return: AppMode,
  pub theme_index: usize,
  pub results_state: ListState,
  pub watch_state: ListState,
  pub selected: Option<CatalogItem>,
  pub pipeline: Pipeline<T>,
  pub watchlist: WatchList,
  pub last_error: Option<String>,
  pub status_message: Option<String>,
  /// Informational message, shown below status and error in priority.
  pub info_message: Option<String>,
  pub should_quit: bool,
  /// Poster cell area from the last draw, set only for graphics-protocol modes.
  pub poster_area: Option<Rect>,
  pending_add: Option<CatalogItem>,
  /// Poster whose upload failed; not retried until the movie is selected again.
  failed_upload: Option<String>,
  config: Config,
  config_path: Option<PathBuf>,
  error_time: Option<Instant>,
}

impl<T: Transport> App<T> {
  pub fn new(pipeline: Pipeline<T>, mut watchlist: WatchList, config: Config, config_path: Option<PathBuf>) -> Self {
    let theme_index = theme::index_of(config.theme_name.as_deref());
    if let Some(user) = &config.last_user
      && let Err(e) = watchlist.login(user)
    {
      warn!(user = %user, err = %e, "app: could not restore last user");
    }

    Self {
      title: TextInput::default(),
      year: TextInput::with_max_len(constants().year_max_len),
      login: TextInput::default(),
      mode: AppMode::Title,
      login_return: AppMode::Title,
      theme_index,
      results_state: ListState::default(),
      watch_state: ListState::default(),
      selected: None,
      pipeline,
      watchlist,
      last_error: None,
      status_message: None,
      info_message: None,
      should_quit: false,
      poster_area: None,
      pending_add: None,
      failed_upload: None,
      config,
      config_path,
      error_time: None,
    }
  }

  pub fn theme(&self) -> &'static theme::Theme {
    &THEMES[self.theme_index % THEMES.len()]
  }

  pub fn results(&self) -> &[CatalogItem] {
    self.pipeline.results()
  }

  /// Set an error message with auto-dismiss tracking.
  pub fn set_error(&mut self, msg: impl Into<String>) {
    self.status_message = None;
    self.last_error = Some(msg.into());
    self.error_time = Some(Instant::now());
  }

  pub fn clear_error(&mut self) {
    self.last_error = None;
    self.error_time = None;
  }

  /// Clear stale error messages once they have been shown long enough.
  pub fn expire_error(&mut self) {
    if let Some(t) = self.error_time
      && t.elapsed().as_secs() >= constants().error_dismiss_secs
    {
      self.clear_error();
    }
  }

  fn set_info(&mut self, msg: impl Into<String>) {
    self.clear_error();
    self.info_message = Some(msg.into());
  }

  fn save_config(&mut self) {
    self.config.theme_name = Some(self.theme().name.to_string());
    self.config.last_user = self.watchlist.user().map(str::to_string);
    if let Some(path) = &self.config_path {
      self.config.save_to(path);
    }
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
    self.save_config();
  }

  // --- Search ---

  pub async fn trigger_search(&mut self) {
    let title = self.title.value.trim().to_string();
    if title.is_empty() {
      self.set_error("Enter a movie title.");
      return;
    }
    let year = self.year.value.trim().to_string();
    self.clear_error();
    self.info_message = None;
    self.selected = None;
    self.results_state.select(None);
    self.status_message = Some(MSG_SEARCHING.to_string());
    self.pipeline.search(&title, &year).await;
  }

  /// Fold this frame's pipeline output into UI state.
  pub async fn poll(&mut self) {
    match self.pipeline.poll_frame().await {
      FrameEvent::Nothing => {}
      FrameEvent::Completed(SearchCompletion::NoResults) => self.set_error(MSG_NO_RESULTS),
      FrameEvent::Completed(SearchCompletion::ConnectionError(e)) => {
        debug!(err = %e, "app: search failed");
        self.set_error(MSG_CONNECTION);
      }
      FrameEvent::Completed(SearchCompletion::Results(_) | SearchCompletion::Single(_)) => {
        self.status_message = None;
        self.results_state.select(Some(0));
        self.mode = AppMode::Results;
      }
      FrameEvent::AutoSelected(result) => {
        self.status_message = None;
        self.results_state.select(Some(0));
        self.mode = AppMode::Results;
        match result {
          Ok(item) => {
            self.failed_upload = None;
            self.selected = Some(item);
          }
          Err(e) => self.set_error(detail_error_message(&e)),
        }
      }
    }
  }

  // --- Selection ---

  fn highlighted(&self) -> Option<CatalogItem> {
    match self.mode {
      AppMode::WatchList => {
        self.watch_state.selected().and_then(|i| self.watchlist.entries().get(i)).map(|e| e.to_item())
      }
      _ => self.results_state.selected().and_then(|i| self.results().get(i)).cloned(),
    }
  }

  pub fn move_highlight(&mut self, delta: isize) {
    let (count, state) = match self.mode {
      AppMode::WatchList => (self.watchlist.entries().len(), &mut self.watch_state),
      _ => (self.pipeline.results().len(), &mut self.results_state),
    };
    if count == 0 {
      return;
    }
    let current = state.selected().unwrap_or(0) as isize;
    let next = (current + delta).rem_euclid(count as isize) as usize;
    state.select(Some(next));
  }

  /// Fetch details for the highlighted movie and queue its poster.
  pub async fn select_highlighted(&mut self) {
    let Some(item) = self.highlighted() else { return };
    self.clear_error();
    self.info_message = None;
    match self.pipeline.select(&item).await {
      Ok(detailed) => {
        info!(title = %detailed.title, year = %detailed.year, "app: movie selected");
        self.failed_upload = None;
        self.selected = Some(detailed);
      }
      Err(e) => {
        warn!(title = %item.title, err = %e, "app: detail fetch failed");
        self.set_error(detail_error_message(&e));
      }
    }
  }

  pub fn poster_state(&self) -> PosterState {
    let Some(url) = self.selected.as_ref().and_then(|s| s.poster_url.as_deref()) else {
      return PosterState::Unavailable;
    };
    match self.pipeline.image_status(url) {
      Some(ImageStatus::Ready(id)) => PosterState::Ready(id),
      Some(ImageStatus::Decoded) => PosterState::Creating,
      Some(ImageStatus::Pending) => PosterState::Loading,
      None => PosterState::Unavailable,
    }
  }

  /// Turn a freshly decoded poster into a texture. UI thread only.
  pub fn check_pending<U: TextureUploader + ?Sized>(&mut self, uploader: &mut U) {
    if self.poster_state() != PosterState::Creating {
      return;
    }
    let Some(url) = self.selected.as_ref().and_then(|s| s.poster_url.clone()) else { return };
    if self.failed_upload.as_deref() == Some(url.as_str()) {
      return;
    }
    if let Err(e) = self.pipeline.materialize(&url, uploader) {
      warn!(url = %url, err = %e, "app: texture upload failed");
      self.failed_upload = Some(url);
    }
  }

  // --- Watch list ---

  pub fn toggle_watchlist(&mut self) {
    match self.mode {
      AppMode::Login => {}
      AppMode::WatchList => self.mode = AppMode::Title,
      _ => {
        self.mode = AppMode::WatchList;
        if self.watch_state.selected().is_none() && !self.watchlist.entries().is_empty() {
          self.watch_state.select(Some(0));
        }
      }
    }
  }

  pub fn add_selected(&mut self) {
    let Some(item) = self.selected.clone().or_else(|| self.highlighted()) else { return };
    if self.watchlist.user().is_none() {
      self.pending_add = Some(item);
      self.open_login();
      return;
    }
    self.add_to_watchlist(&item);
  }

  fn add_to_watchlist(&mut self, item: &CatalogItem) {
    match self.watchlist.add(item) {
      Ok(true) => self.set_info(format!("Added \"{}\" to watch list", item.title)),
      Ok(false) => self.set_error(MSG_ALREADY_LISTED),
      Err(e) => self.set_error(format!("Watch list error: {:#}", e)),
    }
  }

  pub fn remove_selected(&mut self) {
    let Some(item) = self.selected.clone().or_else(|| self.highlighted()) else { return };
    self.remove_title(&item.title);
  }

  pub fn remove_highlighted(&mut self) {
    let Some(item) = self.highlighted() else { return };
    self.remove_title(&item.title);
    let len = self.watchlist.entries().len();
    if len == 0 {
      self.watch_state.select(None);
    } else if self.watch_state.selected().is_some_and(|i| i >= len) {
      self.watch_state.select(Some(len - 1));
    }
  }

  fn remove_title(&mut self, title: &str) {
    match self.watchlist.remove(title) {
      Ok(true) => self.set_info(format!("Removed \"{}\" from watch list", title)),
      Ok(false) => self.set_error(MSG_NOT_LISTED),
      Err(e) => self.set_error(format!("Watch list error: {:#}", e)),
    }
  }

  // --- Login ---

  fn open_login(&mut self) {
    if self.mode != AppMode::Login {
      self.login_return = self.mode;
    }
    self.login.clear();
    self.mode = AppMode::Login;
  }

  pub fn toggle_login(&mut self) {
    if self.mode == AppMode::Login {
      self.cancel_login();
    } else if self.watchlist.user().is_some() {
      self.watchlist.logout();
      self.watch_state.select(None);
      self.save_config();
      self.set_info("Logged out");
    } else {
      self.open_login();
    }
  }

  pub fn submit_login(&mut self) {
    let name = self.login.value.trim().to_string();
    if let Err(e) = self.watchlist.login(&name) {
      self.set_error(format!("Login failed: {:#}", e));
      return;
    }
    self.mode = self.login_return;
    self.watch_state.select(if self.watchlist.entries().is_empty() { None } else { Some(0) });
    self.save_config();
    self.set_info(format!("Logged in as {}", name));
    if let Some(item) = self.pending_add.take() {
      self.add_to_watchlist(&item);
    }
  }

  /// Leave the prompt without logging in; a pending add is dropped.
  pub fn cancel_login(&mut self) {
    self.pending_add = None;
    self.login.clear();
    self.mode = self.login_return;
  }

  pub async fn shutdown(&mut self) {
    self.pipeline.shutdown().await;
  }
}
