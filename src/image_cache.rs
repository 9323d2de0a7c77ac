//! Poster cache keyed by URL.
//!
//! Each URL moves through `Pending → Decoded → Ready` and never back. The
//! loader thread owns the first hop (it installs decoded pixels); the last
//! hop is the upload into the renderer and happens only on the thread that
//! holds it. A failed download or decode removes the entry so the next
//! request starts over. Entries otherwise live for the whole process.

use std::collections::{HashMap, VecDeque};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::decode::DecodedImage;

/// Handle to an image resident in the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// The rendering context. Implementors create texture resources from CPU pixels.
pub trait TextureUploader {
  fn upload(&mut self, image: &DecodedImage) -> anyhow::Result<TextureId>;
}

enum ImageState {
  Pending,
  Decoded(DecodedImage),
  /// Pixels are out with the uploader; reported as `Decoded`.
  Uploading,
  Ready(TextureId),
}

/// What the UI sees of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStatus {
  Pending,
  Decoded,
  Ready(TextureId),
}

/// Outcome of one loader wait.
#[derive(Debug, PartialEq, Eq)]
pub enum LoaderWake {
  Stop,
  Idle,
  Url(String),
}

#[derive(Default)]
struct CacheState {
  entries: HashMap<String, ImageState>,
  pending: VecDeque<String>,
  stopping: bool,
}

#[derive(Default)]
pub struct ImageCache {
  state: Mutex<CacheState>,
  wake: Condvar,
}

impl ImageCache {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, CacheState> {
    self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  /// Queue `url` for loading unless an entry already exists. Returns whether it was queued.
  pub fn request(&self, url: &str) -> bool {
    let mut state = self.lock();
    if state.entries.contains_key(url) {
      return false;
    }
    state.entries.insert(url.to_string(), ImageState::Pending);
    state.pending.push_back(url.to_string());
    drop(state);
    self.wake.notify_one();
    true
  }

  /// Block up to `timeout` for work or a stop request, then take at most one URL.
  pub fn next_pending(&self, timeout: Duration) -> LoaderWake {
    let guard = self.lock();
    let (mut state, _) = self
      .wake
      .wait_timeout_while(guard, timeout, |s| s.pending.is_empty() && !s.stopping)
      .unwrap_or_else(|poisoned| poisoned.into_inner());
    if state.stopping {
      return LoaderWake::Stop;
    }
    match state.pending.pop_front() {
      Some(url) => LoaderWake::Url(url),
      None => LoaderWake::Idle,
    }
  }

  /// Store decoded pixels. Only a `Pending` entry accepts them.
  pub fn install(&self, url: &str, image: DecodedImage) -> bool {
    let mut state = self.lock();
    let Some(entry) = state.entries.get_mut(url) else {
      return false;
    };
    if !matches!(entry, ImageState::Pending) {
      return false;
    }
    *entry = ImageState::Decoded(image);
    true
  }

  /// Drop a `Pending` entry after a failed load so a later request retries it.
  pub fn forget(&self, url: &str) -> bool {
    let mut state = self.lock();
    if matches!(state.entries.get(url), Some(ImageState::Pending)) {
      state.entries.remove(url);
      return true;
    }
    false
  }

  pub fn status(&self, url: &str) -> Option<ImageStatus> {
    self.lock().entries.get(url).map(|entry| match entry {
      ImageState::Pending => ImageStatus::Pending,
      ImageState::Decoded(_) | ImageState::Uploading => ImageStatus::Decoded,
      ImageState::Ready(id) => ImageStatus::Ready(*id),
    })
  }

  /// Upload a `Decoded` entry through `uploader` and release its pixels.
  ///
  /// Must only be called by the owner of the rendering context. Missing and
  /// pending entries yield `None`; ready entries return their existing id
  /// without another upload. A failed upload leaves the entry `Decoded`.
  /// The cache lock is released while the uploader runs.
  pub fn materialize<U: TextureUploader + ?Sized>(
    &self,
    url: &str,
    uploader: &mut U,
  ) -> anyhow::Result<Option<TextureId>> {
    let image = {
      let mut state = self.lock();
      match state.entries.remove(url) {
        None => return Ok(None),
        Some(ImageState::Decoded(image)) => {
          state.entries.insert(url.to_string(), ImageState::Uploading);
          image
        }
        Some(other) => {
          let id = match &other {
            ImageState::Ready(id) => Some(*id),
            _ => None,
          };
          state.entries.insert(url.to_string(), other);
          return Ok(id);
        }
      }
    };
    match uploader.upload(&image) {
      Ok(id) => {
        self.lock().entries.insert(url.to_string(), ImageState::Ready(id));
        Ok(Some(id))
      }
      Err(e) => {
        self.lock().entries.insert(url.to_string(), ImageState::Decoded(image));
        Err(e)
      }
    }
  }

  pub fn stop(&self) {
    self.lock().stopping = true;
    self.wake.notify_all();
  }

  /// URLs known to the cache in any state.
  pub fn entry_count(&self) -> usize {
    self.lock().entries.len()
  }
}
