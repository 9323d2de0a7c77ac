//! Tunables for the catalog client, poster loader and frame loop, embedded
//! from `constants.ron` with `include_str!` and parsed once on first access.

use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  // Catalog endpoints
  pub api_base: String,
  pub image_host: String,
  pub user_agent: String,

  // Image transport
  pub image_connect_timeout_secs: u64,
  pub image_read_timeout_secs: u64,

  // Image loader
  pub loader_wait_ms: u64,

  // Frame loop
  pub frame_poll_ms: u64,
  pub input_slice_ms: u64,
  pub error_dismiss_secs: u64,

  // Poster area
  pub poster_cols: u16,
  pub poster_rows: u16,

  // Inputs
  pub year_max_len: usize,
}

impl Constants {
  pub fn loader_wait(&self) -> Duration {
    Duration::from_millis(self.loader_wait_ms)
  }

  pub fn frame_poll(&self) -> Duration {
    Duration::from_millis(self.frame_poll_ms)
  }

  pub fn input_slice(&self) -> Duration {
    Duration::from_millis(self.input_slice_ms)
  }
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is a build-time error.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}
