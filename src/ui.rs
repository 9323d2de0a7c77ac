use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Rect},
  style::{Modifier, Style, Stylize},
  text::{Line, Span},
  widgets::{Block, BorderType, List, ListItem, ListState, Padding, Paragraph, Wrap},
};
use std::io::Write;

use crate::app::{App, AppMode, PosterState};
use crate::catalog::{CatalogItem, Transport};
use crate::constants::constants;
use crate::graphics::{PosterWidget, Renderer};
use crate::input::TextInput;
use crate::theme::Theme;

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  use unicode_width::UnicodeWidthChar;
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` characters, appending "…" if truncated.
fn truncate_str(s: &str, max_width: usize) -> String {
  if s.chars().count() <= max_width {
    s.to_string()
  } else {
    let truncated: String = s.chars().take(max_width.saturating_sub(1)).collect();
    format!("{}…", truncated)
  }
}

fn bordered(theme: &Theme, title: impl Into<Line<'static>>, focused: bool) -> Block<'static> {
  let color = if focused { theme.accent } else { theme.border };
  Block::bordered()
    .title(title)
    .title_style(Style::default().fg(color).add_modifier(Modifier::BOLD))
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(color))
}

/// Center a `width`×`height` box inside `area`, clamped to fit.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
  let width = width.min(area.width);
  let height = height.min(area.height);
  Rect { x: area.x + (area.width - width) / 2, y: area.y, width, height }
}

// --- UI Rendering ---

pub fn ui<T: Transport, W: Write>(frame: &mut Frame, app: &mut App<T>, renderer: &mut Renderer<W>) {
  let theme = app.theme();
  app.poster_area = None;

  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), frame.area());

  let [header_area, main_area, status_area, input_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Min(3),
    Constraint::Length(1),
    Constraint::Length(3),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  let [detail_area, list_area] =
    Layout::horizontal([Constraint::Percentage(45), Constraint::Percentage(55)]).areas(main_area);

  render_header(frame, theme, renderer, header_area);
  render_details(frame, app, renderer, detail_area);
  if app.mode == AppMode::WatchList {
    render_watchlist(frame, app, list_area);
  } else {
    render_results(frame, app, list_area);
  }
  render_status(frame, app, status_area);
  render_inputs(frame, app, input_area);
  render_footer(frame, app, footer_area);
}

fn render_header<W: Write>(frame: &mut Frame, theme: &Theme, renderer: &Renderer<W>, area: Rect) {
  let left = Line::from(vec![
    Span::styled(" ▶ reel ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
    Span::styled(format!("[{}]", renderer.mode().label().to_lowercase()), Style::default().fg(theme.muted)),
  ]);
  frame.render_widget(left, area);

  let version = format!("v{} ", env!("CARGO_PKG_VERSION"));
  let right = Line::from(Span::styled(&version, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(version.len() as u16), width: version.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

fn detail_lines(theme: &Theme, item: &CatalogItem, width: usize) -> Vec<Line<'static>> {
  let field = |label: &'static str, value: String| {
    let value_w = width.saturating_sub(label.len());
    Line::from(vec![
      Span::styled(label, Style::default().fg(theme.muted)),
      Span::styled(truncate_str(&value, value_w), Style::default().fg(theme.fg)),
    ])
  };
  vec![
    Line::from(Span::styled(
      truncate_str(&item.title, width),
      Style::default().fg(theme.fg).add_modifier(Modifier::BOLD),
    )),
    field("Year      ", item.year.clone()),
    field("Director  ", item.director.clone()),
    field("Runtime   ", item.runtime.clone()),
    field("IMDb      ", item.rating.clone()),
    field("Votes     ", item.votes.clone()),
    field("Genres    ", item.genres.join(", ")),
    field("Cast      ", item.cast.join(", ")),
  ]
}

fn render_details<T: Transport, W: Write>(frame: &mut Frame, app: &mut App<T>, renderer: &mut Renderer<W>, area: Rect) {
  let theme = app.theme();
  let block = bordered(theme, " Details ", false).padding(Padding::horizontal(1));
  let inner = block.inner(area);
  frame.render_widget(block, area);

  let Some(item) = &app.selected else {
    let hint = Paragraph::new(vec![
      Line::from(""),
      Line::from(Span::styled("Search for a movie by title,", Style::default().fg(theme.muted))),
      Line::from(Span::styled("then press Enter on a result.", Style::default().fg(theme.muted))),
    ])
    .alignment(Alignment::Center);
    frame.render_widget(hint, inner);
    return;
  };

  let lines = detail_lines(theme, item, inner.width as usize);
  let [info_area, _, poster_region] =
    Layout::vertical([Constraint::Length(lines.len() as u16), Constraint::Length(1), Constraint::Min(0)]).areas(inner);
  frame.render_widget(Paragraph::new(lines), info_area);

  let c = constants();
  let poster_area = centered(poster_region, c.poster_cols, c.poster_rows);
  if poster_area.is_empty() {
    return;
  }

  match app.poster_state() {
    PosterState::Ready(_) if renderer.mode().uses_graphics_protocol() => app.poster_area = Some(poster_area),
    PosterState::Ready(id) => {
      let display_mode = renderer.mode();
      if let Some(image) = renderer.fitted(id, poster_area) {
        frame.render_widget(PosterWidget { image, display_mode }, poster_area);
      }
    }
    state => {
      let label = Paragraph::new(Span::styled(state.label(), Style::default().fg(theme.muted)))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
      frame.render_widget(label, poster_area);
    }
  }
}

fn render_list(frame: &mut Frame, theme: &Theme, title: String, rows: Vec<(String, bool)>, state: &mut ListState, area: Rect) {
  let inner_w = area.width.saturating_sub(4) as usize;
  let items: Vec<ListItem> = rows
    .into_iter()
    .enumerate()
    .map(|(i, (label, listed))| {
      let is_selected = Some(i) == state.selected();
      let fg = if is_selected { theme.highlight_fg } else { theme.fg };
      let bg = if is_selected {
        theme.highlight_bg
      } else if i % 2 == 1 {
        theme.stripe_bg
      } else {
        theme.bg
      };
      let marker = if listed { " ★" } else { "" };
      let label = truncate_str(&label, inner_w.saturating_sub(marker.chars().count()));
      ListItem::new(Line::from(vec![
        Span::styled(label, Style::default().fg(fg)),
        Span::styled(marker, Style::default().fg(theme.accent)),
      ]))
      .bg(bg)
    })
    .collect();

  let list = List::new(items)
    .block(bordered(theme, title, true))
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));
  frame.render_stateful_widget(list, area, state);
}

fn render_results<T: Transport>(frame: &mut Frame, app: &mut App<T>, area: Rect) {
  let theme = app.theme();
  let rows: Vec<(String, bool)> = app
    .results()
    .iter()
    .map(|item| (format!("{} ({})", item.title, item.year), app.watchlist.contains(&item.title)))
    .collect();
  let title = if rows.is_empty() { " Results ".to_string() } else { format!(" Results — {} ", rows.len()) };
  render_list(frame, theme, title, rows, &mut app.results_state, area);
}

fn render_watchlist<T: Transport>(frame: &mut Frame, app: &mut App<T>, area: Rect) {
  let theme = app.theme();
  let title = match app.watchlist.user() {
    Some(user) => format!(" Watch list — {} ", user),
    None => " Watch list (^l to log in) ".to_string(),
  };
  let rows: Vec<(String, bool)> =
    app.watchlist.entries().iter().map(|e| (format!("{} ({})", e.title, e.year), false)).collect();
  render_list(frame, theme, title, rows, &mut app.watch_state, area);
}

fn render_status<T: Transport>(frame: &mut Frame, app: &App<T>, area: Rect) {
  let theme = app.theme();
  let (text, style) = if let Some(msg) = &app.status_message {
    (format!(" ⏳ {}", msg), Style::default().fg(theme.status))
  } else if let Some(err) = &app.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(theme.error))
  } else if let Some(info) = &app.info_message {
    (format!(" ℹ  {}", info), Style::default().fg(theme.status))
  } else {
    let who = app.watchlist.user().map_or_else(|| "not logged in".to_string(), |u| format!("logged in as {}", u));
    (format!(" Ready · {}", who), Style::default().fg(theme.muted))
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

/// Draw one text field, keeping the cursor in view. Returns the cursor cell when focused.
fn render_field(frame: &mut Frame, theme: &Theme, field: &mut TextInput, label: &'static str, focused: bool, area: Rect) -> Option<(u16, u16)> {
  let block = bordered(theme, label, focused).padding(Padding::horizontal(1));
  let inner_w = area.width.saturating_sub(4).max(1) as usize;
  let cursor_col = display_width(&field.value, field.cursor);

  if cursor_col < field.scroll {
    field.scroll = cursor_col;
  } else if cursor_col >= field.scroll + inner_w {
    field.scroll = cursor_col.saturating_sub(inner_w) + 1;
  }

  let scroll = field.scroll;
  let visible: String = field
    .value
    .chars()
    .scan(0usize, |col, c| {
      let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= scroll)
    .take_while(|(start, _, _)| *start < scroll + inner_w)
    .map(|(_, _, c)| c)
    .collect();

  frame.render_widget(Paragraph::new(visible).style(Style::default().fg(theme.fg)).block(block), area);
  focused.then(|| (area.x + 2 + (cursor_col - scroll) as u16, area.y + 1))
}

fn render_inputs<T: Transport>(frame: &mut Frame, app: &mut App<T>, area: Rect) {
  let theme = app.theme();
  let cursor = if app.mode == AppMode::Login {
    render_field(frame, theme, &mut app.login, " Username (Enter to log in, Esc to skip) ", true, area)
  } else {
    let [title_area, year_area] = Layout::horizontal([Constraint::Min(10), Constraint::Length(10)]).areas(area);
    let title_cursor = render_field(frame, theme, &mut app.title, " Title ", app.mode == AppMode::Title, title_area);
    let year_cursor = render_field(frame, theme, &mut app.year, " Year ", app.mode == AppMode::Year, year_area);
    title_cursor.or(year_cursor)
  };
  if let Some(position) = cursor {
    frame.set_cursor_position(position);
  }
}

fn render_footer<T: Transport>(frame: &mut Frame, app: &App<T>, area: Rect) {
  let theme = app.theme();
  let login_label = if app.watchlist.user().is_some() { "Logout" } else { "Login" };
  let keys: Vec<(&str, &str)> = match app.mode {
    AppMode::Title | AppMode::Year => {
      let mut k = vec![("Enter", "Search"), ("Tab", "Title/Year")];
      if !app.results().is_empty() {
        k.push(("↓", "Results"));
      }
      k.extend([("^w", "Watch list"), ("^l", login_label), ("^t", "Theme"), ("Esc", "Quit")]);
      k
    }
    AppMode::Results => vec![
      ("Enter", "Details"),
      ("j/k", "Navigate"),
      ("a", "Add"),
      ("r", "Remove"),
      ("^w", "Watch list"),
      ("^l", login_label),
      ("Esc", "Back"),
    ],
    AppMode::WatchList => {
      vec![("Enter", "Details"), ("j/k", "Navigate"), ("r", "Remove"), ("^l", login_label), ("Esc", "Back")]
    }
    AppMode::Login => vec![("Enter", "Log in"), ("Esc", "Skip")],
  };

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(theme.key_fg).bg(theme.key_bg)),
        Span::styled(format!(" {} ", action), Style::default().fg(theme.muted)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw("  "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);

  let theme_label = format!("{} ", theme.name);
  let right = Line::from(Span::styled(&theme_label, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(theme_label.len() as u16), width: theme_label.len() as u16, ..area };
  frame.render_widget(right, right_area);
}
