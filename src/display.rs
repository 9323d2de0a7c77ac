use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliDisplayMode {
  Auto,
  Kitty,
  Sixel,
  Direct,
  Ascii,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
  Ascii,
  Direct,
  Sixel,
  Kitty,
}

impl DisplayMode {
  pub fn label(self) -> &'static str {
    match self {
      DisplayMode::Ascii => "ASCII",
      DisplayMode::Direct => "Half-block",
      DisplayMode::Sixel => "Sixel",
      DisplayMode::Kitty => "Kitty",
    }
  }

  /// Posters are drawn by the terminal itself rather than into the cell buffer.
  pub fn uses_graphics_protocol(self) -> bool {
    matches!(self, DisplayMode::Kitty | DisplayMode::Sixel)
  }
}

/// Detect the best display mode the terminal supports.
///
/// Probe order: Kitty graphics > Sixel > true-color half-block > ASCII
///
/// - Kitty: `TERM=xterm-kitty`, or `TERM_PROGRAM` is kitty/WezTerm/ghostty
/// - Sixel: `TERM_PROGRAM` is foot/mlterm/contour, or `TERM` contains "sixel"
/// - Direct: `COLORTERM` is `truecolor` or `24bit`
/// - Ascii: fallback
pub fn detect_display_mode() -> DisplayMode {
  let var = |name| std::env::var(name).unwrap_or_default();
  detect_from(&var("TERM"), &var("TERM_PROGRAM"), &var("COLORTERM"))
}

pub fn detect_from(term: &str, term_program: &str, colorterm: &str) -> DisplayMode {
  let term_program = term_program.to_lowercase();
  if term == "xterm-kitty" || matches!(term_program.as_str(), "kitty" | "wezterm" | "ghostty") {
    return DisplayMode::Kitty;
  }

  if matches!(term_program.as_str(), "foot" | "mlterm" | "contour") || term.contains("sixel") {
    return DisplayMode::Sixel;
  }

  let colorterm = colorterm.to_lowercase();
  if colorterm == "truecolor" || colorterm == "24bit" {
    return DisplayMode::Direct;
  }

  DisplayMode::Ascii
}

pub fn resolve_display_mode(cli: CliDisplayMode) -> DisplayMode {
  match cli {
    CliDisplayMode::Auto => detect_display_mode(),
    CliDisplayMode::Kitty => DisplayMode::Kitty,
    CliDisplayMode::Sixel => DisplayMode::Sixel,
    CliDisplayMode::Direct => DisplayMode::Direct,
    CliDisplayMode::Ascii => DisplayMode::Ascii,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn kitty_wins_over_everything() {
    assert_eq!(detect_from("xterm-kitty", "", "truecolor"), DisplayMode::Kitty);
    assert_eq!(detect_from("xterm-256color", "WezTerm", ""), DisplayMode::Kitty);
    assert_eq!(detect_from("xterm-ghostty", "ghostty", ""), DisplayMode::Kitty);
  }

  #[test]
  fn sixel_terminals() {
    assert_eq!(detect_from("foot", "foot", "truecolor"), DisplayMode::Sixel);
    assert_eq!(detect_from("xterm-sixel", "", ""), DisplayMode::Sixel);
  }

  #[test]
  fn truecolor_falls_back_to_half_blocks_then_ascii() {
    assert_eq!(detect_from("xterm-256color", "Apple_Terminal", "24bit"), DisplayMode::Direct);
    assert_eq!(detect_from("xterm-256color", "", "TrueColor"), DisplayMode::Direct);
    assert_eq!(detect_from("vt100", "", ""), DisplayMode::Ascii);
  }

  #[test]
  fn explicit_cli_choice_skips_detection() {
    assert_eq!(resolve_display_mode(CliDisplayMode::Ascii), DisplayMode::Ascii);
    assert_eq!(resolve_display_mode(CliDisplayMode::Kitty), DisplayMode::Kitty);
  }
}
