use anyhow::Result;
use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, AppMode};
use crate::catalog::Transport;

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

// --- Text Field ---

/// Single-line editable field with a char-indexed cursor.
#[derive(Debug, Default, Clone)]
pub struct TextInput {
  pub value: String,
  pub cursor: usize,
  /// Horizontal scroll offset in display columns.
  pub scroll: usize,
  max_len: Option<usize>,
}

impl TextInput {
  pub fn with_max_len(max_len: usize) -> Self {
    Self { max_len: Some(max_len), ..Self::default() }
  }

  fn len(&self) -> usize {
    self.value.chars().count()
  }

  pub fn insert(&mut self, c: char) {
    if self.max_len.is_some_and(|max| self.len() >= max) {
      return;
    }
    let byte_idx = char_to_byte_index(&self.value, self.cursor);
    self.value.insert(byte_idx, c);
    self.cursor += 1;
  }

  pub fn backspace(&mut self) {
    if self.cursor > 0 {
      self.cursor -= 1;
      let byte_idx = char_to_byte_index(&self.value, self.cursor);
      self.value.remove(byte_idx);
    }
  }

  pub fn delete(&mut self) {
    if self.cursor < self.len() {
      let byte_idx = char_to_byte_index(&self.value, self.cursor);
      self.value.remove(byte_idx);
    }
  }

  pub fn left(&mut self) {
    self.cursor = self.cursor.saturating_sub(1);
  }

  pub fn right(&mut self) {
    if self.cursor < self.len() {
      self.cursor += 1;
    }
  }

  pub fn home(&mut self) {
    self.cursor = 0;
  }

  pub fn end(&mut self) {
    self.cursor = self.len();
  }

  pub fn clear(&mut self) {
    self.value.clear();
    self.cursor = 0;
    self.scroll = 0;
  }

  /// Apply an editing key; anything else is ignored.
  fn edit(&mut self, code: KeyCode) {
    match code {
      KeyCode::Char(c) => self.insert(c),
      KeyCode::Backspace => self.backspace(),
      KeyCode::Delete => self.delete(),
      KeyCode::Left => self.left(),
      KeyCode::Right => self.right(),
      KeyCode::Home => self.home(),
      KeyCode::End => self.end(),
      _ => {}
    }
  }
}

// --- Event Handling ---

pub async fn handle_key_event<T: Transport>(app: &mut App<T>, key: KeyEvent) -> Result<()> {
  if key.modifiers.contains(KeyModifiers::CONTROL) {
    match key.code {
      KeyCode::Char('c') => app.should_quit = true,
      KeyCode::Char('t') => app.next_theme(),
      KeyCode::Char('w') => app.toggle_watchlist(),
      KeyCode::Char('l') => app.toggle_login(),
      _ => {}
    }
    return Ok(());
  }

  match app.mode {
    AppMode::Title | AppMode::Year => handle_search_key(app, key).await,
    AppMode::Results => handle_results_key(app, key).await,
    AppMode::WatchList => handle_watchlist_key(app, key).await,
    AppMode::Login => handle_login_key(app, key),
  }
  Ok(())
}

async fn handle_search_key<T: Transport>(app: &mut App<T>, key: KeyEvent) {
  app.clear_error();
  match key.code {
    KeyCode::Enter => app.trigger_search().await,
    KeyCode::Tab | KeyCode::BackTab => {
      app.mode = if app.mode == AppMode::Title { AppMode::Year } else { AppMode::Title };
    }
    KeyCode::Esc => app.should_quit = true,
    KeyCode::Down => {
      if !app.results().is_empty() {
        app.mode = AppMode::Results;
      }
    }
    KeyCode::Char(c) if app.mode == AppMode::Year && !c.is_ascii_digit() => {}
    code => {
      if app.mode == AppMode::Title {
        app.title.edit(code);
      } else {
        app.year.edit(code);
      }
    }
  }
}

async fn handle_results_key<T: Transport>(app: &mut App<T>, key: KeyEvent) {
  match key.code {
    KeyCode::Enter => app.select_highlighted().await,
    KeyCode::Down | KeyCode::Char('j') => app.move_highlight(1),
    KeyCode::Up | KeyCode::Char('k') => app.move_highlight(-1),
    KeyCode::Char('a') => app.add_selected(),
    KeyCode::Char('r') => app.remove_selected(),
    KeyCode::Esc | KeyCode::Tab | KeyCode::Char('/') => app.mode = AppMode::Title,
    _ => {}
  }
}

async fn handle_watchlist_key<T: Transport>(app: &mut App<T>, key: KeyEvent) {
  match key.code {
    KeyCode::Enter => app.select_highlighted().await,
    KeyCode::Down | KeyCode::Char('j') => app.move_highlight(1),
    KeyCode::Up | KeyCode::Char('k') => app.move_highlight(-1),
    KeyCode::Char('r') => app.remove_highlighted(),
    KeyCode::Esc => app.toggle_watchlist(),
    _ => {}
  }
}

fn handle_login_key<T: Transport>(app: &mut App<T>, key: KeyEvent) {
  match key.code {
    KeyCode::Enter => app.submit_login(),
    KeyCode::Esc => app.cancel_login(),
    code => app.login.edit(code),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{FakeTransport, search_json, test_app};

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn ctrl(c: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
  }

  #[test]
  fn char_index_handles_multibyte() {
    assert_eq!(char_to_byte_index("héllo", 2), 3);
    assert_eq!(char_to_byte_index("abc", 10), 3);
  }

  #[test]
  fn text_input_edits_at_cursor() {
    let mut input = TextInput::default();
    for c in "Alen".chars() {
      input.insert(c);
    }
    input.left();
    input.left();
    input.insert('i');
    assert_eq!(input.value, "Alien");
    input.home();
    input.delete();
    input.end();
    input.backspace();
    assert_eq!(input.value, "lie");
    assert_eq!(input.cursor, 3);
    input.clear();
    assert!(input.value.is_empty());
    assert_eq!(input.cursor, 0);
  }

  #[test]
  fn max_len_caps_input() {
    let mut year = TextInput::with_max_len(4);
    for c in "199512".chars() {
      year.insert(c);
    }
    assert_eq!(year.value, "1995");
  }

  #[tokio::test]
  async fn tab_switches_fields_and_year_takes_digits_only() {
    let (mut app, _dir) = test_app(FakeTransport::default());
    handle_key_event(&mut app, key(KeyCode::Char('H'))).await.unwrap();
    handle_key_event(&mut app, key(KeyCode::Tab)).await.unwrap();
    assert_eq!(app.mode, AppMode::Year);
    for c in "19x95".chars() {
      handle_key_event(&mut app, key(KeyCode::Char(c))).await.unwrap();
    }
    assert_eq!(app.title.value, "H");
    assert_eq!(app.year.value, "1995");
    handle_key_event(&mut app, key(KeyCode::Tab)).await.unwrap();
    assert_eq!(app.mode, AppMode::Title);
    app.shutdown().await;
  }

  #[tokio::test]
  async fn enter_searches_and_esc_quits() {
    let fake = FakeTransport::default().respond("?s=Heat", 200, search_json(&[("Heat", "1995", "N/A"), ("Heat", "1986", "N/A")]));
    let (mut app, _dir) = test_app(fake.clone());
    for c in "Heat".chars() {
      handle_key_event(&mut app, key(KeyCode::Char(c))).await.unwrap();
    }
    handle_key_event(&mut app, key(KeyCode::Enter)).await.unwrap();
    assert_eq!(app.status_message.as_deref(), Some("Searching…"));
    assert!(!app.should_quit);
    handle_key_event(&mut app, key(KeyCode::Esc)).await.unwrap();
    assert!(app.should_quit);
    app.shutdown().await;
    assert_eq!(fake.hits("?s=Heat"), 1);
  }

  #[tokio::test]
  async fn control_keys_work_in_every_mode() {
    let (mut app, _dir) = test_app(FakeTransport::default());
    let theme = app.theme_index;
    handle_key_event(&mut app, ctrl('t')).await.unwrap();
    assert_ne!(app.theme_index, theme);
    handle_key_event(&mut app, ctrl('w')).await.unwrap();
    assert_eq!(app.mode, AppMode::WatchList);
    handle_key_event(&mut app, ctrl('l')).await.unwrap();
    assert_eq!(app.mode, AppMode::Login);
    handle_key_event(&mut app, key(KeyCode::Esc)).await.unwrap();
    assert_eq!(app.mode, AppMode::WatchList);
    handle_key_event(&mut app, ctrl('c')).await.unwrap();
    assert!(app.should_quit);
    app.shutdown().await;
  }

  #[tokio::test]
  async fn login_prompt_collects_username() {
    let (mut app, _dir) = test_app(FakeTransport::default());
    handle_key_event(&mut app, ctrl('l')).await.unwrap();
    for c in "zoe".chars() {
      handle_key_event(&mut app, key(KeyCode::Char(c))).await.unwrap();
    }
    handle_key_event(&mut app, key(KeyCode::Enter)).await.unwrap();
    assert_eq!(app.watchlist.user(), Some("zoe"));
    assert_eq!(app.mode, AppMode::Title);
    app.shutdown().await;
  }
}
