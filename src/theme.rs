use ratatui::style::Color;

pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub accent: Color,
  pub muted: Color,
  pub border: Color,
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  pub stripe_bg: Color,
  pub status: Color,
  pub error: Color,
  pub key_fg: Color,
  pub key_bg: Color,
}

pub const THEMES: &[Theme] = &[
  Theme {
    name: "Marquee",
    bg: Color::Rgb(24, 20, 28),
    fg: Color::Rgb(236, 228, 214),
    accent: Color::Rgb(245, 190, 80),
    muted: Color::Rgb(140, 128, 120),
    border: Color::Rgb(74, 62, 70),
    highlight_fg: Color::Rgb(24, 20, 28),
    highlight_bg: Color::Rgb(245, 190, 80),
    stripe_bg: Color::Rgb(32, 27, 37),
    status: Color::Rgb(130, 200, 170),
    error: Color::Rgb(235, 100, 90),
    key_fg: Color::Rgb(24, 20, 28),
    key_bg: Color::Rgb(190, 170, 150),
  },
  Theme {
    name: "Noir",
    bg: Color::Rgb(16, 16, 16),
    fg: Color::Rgb(220, 220, 220),
    accent: Color::Rgb(255, 255, 255),
    muted: Color::Rgb(120, 120, 120),
    border: Color::Rgb(60, 60, 60),
    highlight_fg: Color::Rgb(16, 16, 16),
    highlight_bg: Color::Rgb(200, 200, 200),
    stripe_bg: Color::Rgb(24, 24, 24),
    status: Color::Rgb(180, 180, 180),
    error: Color::Rgb(220, 80, 80),
    key_fg: Color::Rgb(16, 16, 16),
    key_bg: Color::Rgb(150, 150, 150),
  },
  Theme {
    name: "Technicolor",
    bg: Color::Rgb(20, 24, 44),
    fg: Color::Rgb(230, 232, 250),
    accent: Color::Rgb(255, 110, 170),
    muted: Color::Rgb(128, 134, 170),
    border: Color::Rgb(60, 68, 110),
    highlight_fg: Color::Rgb(20, 24, 44),
    highlight_bg: Color::Rgb(120, 220, 255),
    stripe_bg: Color::Rgb(26, 31, 56),
    status: Color::Rgb(120, 220, 255),
    error: Color::Rgb(255, 120, 100),
    key_fg: Color::Rgb(20, 24, 44),
    key_bg: Color::Rgb(190, 160, 255),
  },
  Theme {
    name: "Matinee",
    bg: Color::Rgb(250, 246, 238),
    fg: Color::Rgb(50, 44, 40),
    accent: Color::Rgb(176, 60, 60),
    muted: Color::Rgb(140, 130, 120),
    border: Color::Rgb(210, 200, 186),
    highlight_fg: Color::Rgb(250, 246, 238),
    highlight_bg: Color::Rgb(176, 60, 60),
    stripe_bg: Color::Rgb(243, 238, 228),
    status: Color::Rgb(60, 120, 100),
    error: Color::Rgb(190, 40, 40),
    key_fg: Color::Rgb(250, 246, 238),
    key_bg: Color::Rgb(110, 100, 92),
  },
];

/// Index of the theme called `name`, or the first theme.
pub fn index_of(name: Option<&str>) -> usize {
  name.and_then(|n| THEMES.iter().position(|t| t.name == n)).unwrap_or(0)
}
