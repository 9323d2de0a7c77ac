use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::catalog::{CatalogClient, Transport};
use crate::decode::ImageDecoder;
use crate::image_cache::{ImageCache, LoaderWake};

/// Tells the frame loop that background work produced something worth drawing.
#[derive(Debug, Clone, Default)]
pub struct FrameWaker(Arc<AtomicBool>);

impl FrameWaker {
  pub fn wake(&self) {
    self.0.store(true, Ordering::Release);
  }

  /// Consume a pending wake.
  pub fn take(&self) -> bool {
    self.0.swap(false, Ordering::AcqRel)
  }
}

/// Start the long-lived poster loader thread.
///
/// The thread drives its own current-thread tokio runtime for the HTTP calls,
/// handles one URL per wake, and exits once the cache is told to stop.
pub fn spawn_image_loader<T, D>(
  cache: Arc<ImageCache>,
  client: Arc<CatalogClient<T>>,
  decoder: D,
  waker: FrameWaker,
  wait: Duration,
) -> Result<JoinHandle<()>>
where
  T: Transport,
  D: ImageDecoder,
{
  std::thread::Builder::new()
    .name("image-loader".to_string())
    .spawn(move || run_loader(&cache, &client, &decoder, &waker, wait))
    .context("Failed to spawn image loader thread")
}

fn run_loader<T: Transport, D: ImageDecoder>(
  cache: &ImageCache,
  client: &CatalogClient<T>,
  decoder: &D,
  waker: &FrameWaker,
  wait: Duration,
) {
  let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
    Ok(rt) => rt,
    Err(e) => {
      error!(err = %e, "loader: failed to build runtime, posters disabled");
      return;
    }
  };
  info!("loader: started");
  loop {
    match cache.next_pending(wait) {
      LoaderWake::Stop => break,
      LoaderWake::Idle => continue,
      LoaderWake::Url(url) => load_one(&runtime, cache, client, decoder, waker, &url),
    }
  }
  info!("loader: stopped");
}

fn load_one<T: Transport, D: ImageDecoder>(
  runtime: &tokio::runtime::Runtime,
  cache: &ImageCache,
  client: &CatalogClient<T>,
  decoder: &D,
  waker: &FrameWaker,
  url: &str,
) {
  debug!(url = %url, "loader: fetching poster");
  let bytes = match runtime.block_on(client.fetch_image_bytes(url)) {
    Ok(bytes) => bytes,
    Err(e) => {
      warn!(url = %url, err = %e, "loader: download failed");
      cache.forget(url);
      return;
    }
  };
  match decoder.decode(&bytes) {
    Ok(image) => {
      debug!(url = %url, width = image.width, height = image.height, cached = cache.entry_count(), "loader: poster decoded");
      if cache.install(url, image) {
        waker.wake();
      }
    }
    Err(e) => {
      warn!(url = %url, err = %e, "loader: decode failed");
      cache.forget(url);
    }
  }
}
