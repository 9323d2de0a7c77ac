use anyhow::{Context, Result, bail};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::catalog::CatalogItem;

/// A saved movie. Only title and year are stored on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEntry {
  pub title: String,
  pub year: String,
}

impl WatchEntry {
  pub fn to_item(&self) -> CatalogItem {
    CatalogItem::new(self.title.clone(), self.year.clone())
  }
}

/// Per-user list of movies, one `title|year` line each in `<users_dir>/<user>.txt`.
pub struct WatchList {
  users_dir: PathBuf,
  user: Option<String>,
  entries: Vec<WatchEntry>,
  titles: HashSet<String>,
}

impl WatchList {
  pub fn new(users_dir: impl Into<PathBuf>) -> Self {
    Self { users_dir: users_dir.into(), user: None, entries: Vec::new(), titles: HashSet::new() }
  }

  pub fn user(&self) -> Option<&str> {
    self.user.as_deref()
  }

  pub fn entries(&self) -> &[WatchEntry] {
    &self.entries
  }

  pub fn contains(&self, title: &str) -> bool {
    self.titles.contains(title)
  }

  fn user_file(&self, user: &str) -> PathBuf {
    self.users_dir.join(format!("{user}.txt"))
  }

  /// Switch to `username`, loading its list or creating an empty one.
  pub fn login(&mut self, username: &str) -> Result<()> {
    let username = username.trim();
    validate_username(username)?;
    fs::create_dir_all(&self.users_dir)
      .with_context(|| format!("Failed to create users directory {}", self.users_dir.display()))?;

    let path = self.user_file(username);
    let entries = if path.exists() {
      load_entries(&path)?
    } else {
      fs::write(&path, "").with_context(|| format!("Failed to create {}", path.display()))?;
      Vec::new()
    };

    self.titles = entries.iter().map(|e| e.title.clone()).collect();
    self.entries = entries;
    self.user = Some(username.to_string());
    info!(user = %username, entries = self.entries.len(), "watchlist: logged in");
    Ok(())
  }

  pub fn logout(&mut self) {
    if let Some(user) = self.user.take() {
      info!(user = %user, "watchlist: logged out");
    }
    self.entries.clear();
    self.titles.clear();
  }

  /// Append `item` unless its title is already listed. Memory only changes
  /// once the file write succeeds.
  pub fn add(&mut self, item: &CatalogItem) -> Result<bool> {
    if self.titles.contains(&item.title) {
      return Ok(false);
    }
    let mut next = self.entries.clone();
    next.push(WatchEntry { title: item.title.clone(), year: item.year.clone() });
    self.save(&next)?;
    self.entries = next;
    self.titles.insert(item.title.clone());
    Ok(true)
  }

  pub fn remove(&mut self, title: &str) -> Result<bool> {
    if !self.titles.contains(title) {
      return Ok(false);
    }
    let next: Vec<WatchEntry> = self.entries.iter().filter(|e| e.title != title).cloned().collect();
    self.save(&next)?;
    self.entries = next;
    self.titles.remove(title);
    Ok(true)
  }

  fn save(&self, entries: &[WatchEntry]) -> Result<()> {
    let Some(user) = &self.user else {
      return Ok(());
    };
    let path = self.user_file(user);
    let body: String = entries.iter().map(|e| format!("{}|{}\n", e.title, e.year)).collect();
    fs::write(&path, body).with_context(|| format!("Failed to write {}", path.display()))?;
    debug!(user = %user, entries = entries.len(), "watchlist: saved");
    Ok(())
  }
}

fn validate_username(name: &str) -> Result<()> {
  if name.is_empty() {
    bail!("Username must not be empty");
  }
  if name.starts_with('.') || !name.chars().all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.')) {
    bail!("Username may only contain letters, digits, '-', '_' and '.'");
  }
  Ok(())
}

/// Split at the first '|'. Lines without one are not entries.
fn parse_line(line: &str) -> Option<WatchEntry> {
  let (title, year) = line.split_once('|')?;
  Some(WatchEntry { title: title.to_string(), year: year.trim_end_matches('\r').to_string() })
}

fn load_entries(path: &Path) -> Result<Vec<WatchEntry>> {
  let raw = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
  let mut seen = HashSet::new();
  Ok(raw.lines().filter_map(parse_line).filter(|e| seen.insert(e.title.clone())).collect())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn item(title: &str, year: &str) -> CatalogItem {
    CatalogItem::new(title, year)
  }

  #[test]
  fn parse_line_splits_at_first_bar() {
    assert_eq!(parse_line("Heat|1995"), Some(WatchEntry { title: "Heat".into(), year: "1995".into() }));
    assert_eq!(parse_line("A|B|2001"), Some(WatchEntry { title: "A".into(), year: "B|2001".into() }));
    assert_eq!(parse_line("no separator"), None);
    assert_eq!(parse_line(""), None);
  }

  #[test]
  fn login_creates_empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let users = dir.path().join("users");
    let mut list = WatchList::new(&users);
    list.login("alice").unwrap();
    assert_eq!(list.user(), Some("alice"));
    assert!(list.entries().is_empty());
    assert_eq!(fs::read_to_string(users.join("alice.txt")).unwrap(), "");
  }

  #[test]
  fn entries_survive_a_new_session() {
    let dir = tempfile::tempdir().unwrap();
    let mut list = WatchList::new(dir.path());
    list.login("alice").unwrap();
    assert!(list.add(&item("Heat", "1995")).unwrap());
    assert!(list.add(&item("Alien", "1979")).unwrap());
    assert!(!list.add(&item("Heat", "1986")).unwrap());

    let mut again = WatchList::new(dir.path());
    again.login("alice").unwrap();
    let titles: Vec<&str> = again.entries().iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["Heat", "Alien"]);
    assert!(again.contains("Alien"));
    assert_eq!(fs::read_to_string(dir.path().join("alice.txt")).unwrap(), "Heat|1995\nAlien|1979\n");
  }

  #[test]
  fn remove_rewrites_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut list = WatchList::new(dir.path());
    list.login("bob").unwrap();
    list.add(&item("Heat", "1995")).unwrap();
    list.add(&item("Alien", "1979")).unwrap();
    assert!(list.remove("Heat").unwrap());
    assert!(!list.remove("Heat").unwrap());
    assert!(!list.contains("Heat"));
    assert_eq!(fs::read_to_string(dir.path().join("bob.txt")).unwrap(), "Alien|1979\n");
  }

  #[test]
  fn failed_write_leaves_list_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("frank.txt");
    let mut list = WatchList::new(dir.path());
    list.login("frank").unwrap();
    list.add(&item("Alien", "1979")).unwrap();

    fs::remove_file(&file).unwrap();
    fs::create_dir(&file).unwrap();
    assert!(list.add(&item("Heat", "1995")).is_err());
    assert!(!list.contains("Heat"));
    assert!(list.remove("Alien").is_err());
    assert!(list.contains("Alien"));
    assert_eq!(list.entries().len(), 1);

    fs::remove_dir(&file).unwrap();
    assert!(list.add(&item("Heat", "1995")).unwrap());
    assert_eq!(fs::read_to_string(&file).unwrap(), "Alien|1979\nHeat|1995\n");
  }

  #[test]
  fn malformed_lines_are_skipped_on_load() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("carol.txt"), "Heat|1995\ngarbage\n\nAlien|1979\n").unwrap();
    let mut list = WatchList::new(dir.path());
    list.login("carol").unwrap();
    assert_eq!(list.entries().len(), 2);
  }

  #[test]
  fn logout_forgets_entries_but_not_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut list = WatchList::new(dir.path());
    list.login("dave").unwrap();
    list.add(&item("Heat", "1995")).unwrap();
    list.logout();
    assert_eq!(list.user(), None);
    assert!(list.entries().is_empty());
    assert!(!list.contains("Heat"));
    assert!(dir.path().join("dave.txt").exists());
  }

  #[test]
  fn logged_out_changes_touch_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut list = WatchList::new(dir.path());
    assert!(list.add(&item("Heat", "1995")).unwrap());
    assert!(list.contains("Heat"));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
  }

  #[test]
  fn unsafe_usernames_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut list = WatchList::new(dir.path());
    for bad in ["", "   ", "../evil", "a/b", ".hidden", "x\\y"] {
      assert!(list.login(bad).is_err(), "accepted {bad:?}");
    }
    assert_eq!(list.user(), None);
    assert!(list.login(" eve ").is_ok());
    assert_eq!(list.user(), Some("eve"));
  }
}
