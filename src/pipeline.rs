//! Everything the frame loop talks to: one catalog client, one search
//! orchestrator, one poster cache and its loader thread. Built once at
//! startup and torn down with `shutdown`.

use anyhow::Result;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogClient, CatalogError, CatalogItem, Transport};
use crate::constants::constants;
use crate::decode::ImageDecoder;
use crate::image_cache::{ImageCache, ImageStatus, TextureId, TextureUploader};
use crate::loader::{FrameWaker, spawn_image_loader};
use crate::search::{SearchCompletion, SearchOrchestrator};

/// What one frame's poll produced.
#[derive(Debug)]
pub enum FrameEvent {
  Nothing,
  Completed(SearchCompletion),
  /// A single-match search was selected without user input.
  AutoSelected(Result<CatalogItem, CatalogError>),
}

pub struct Pipeline<T: Transport> {
  client: Arc<CatalogClient<T>>,
  search: SearchOrchestrator<T>,
  images: Arc<ImageCache>,
  loader: Option<JoinHandle<()>>,
  waker: FrameWaker,
}

impl<T: Transport> Pipeline<T> {
  pub fn start<D: ImageDecoder>(client: Arc<CatalogClient<T>>, decoder: D, waker: FrameWaker) -> Result<Self> {
    let images = Arc::new(ImageCache::new());
    let loader = spawn_image_loader(
      Arc::clone(&images),
      Arc::clone(&client),
      decoder,
      waker.clone(),
      constants().loader_wait(),
    )?;
    info!("pipeline: started");
    Ok(Self { search: SearchOrchestrator::new(Arc::clone(&client)), client, images, loader: Some(loader), waker })
  }

  pub async fn search(&mut self, title: &str, year: &str) {
    self.search.start(title, year).await;
  }

  pub fn searching(&self) -> bool {
    self.search.in_progress()
  }

  pub fn results(&self) -> &[CatalogItem] {
    self.search.results()
  }

  /// Drain search output for this frame. A single match is selected inline,
  /// so this can stall the frame for one detail request.
  pub async fn poll_frame(&mut self) -> FrameEvent {
    let Some(completion) = self.search.drain() else {
      return FrameEvent::Nothing;
    };
    let SearchCompletion::Single(item) = completion else {
      return FrameEvent::Completed(completion);
    };
    debug!(title = %item.title, "pipeline: auto-selecting single match");
    let selected = self.select(&item).await;
    if let Ok(detailed) = &selected {
      self.search.replace_result(0, detailed.clone());
    }
    FrameEvent::AutoSelected(selected)
  }

  /// Fetch full details for `item` and queue its poster.
  pub async fn select(&self, item: &CatalogItem) -> Result<CatalogItem, CatalogError> {
    let detailed = self.client.fetch_detail(item).await?;
    if let Some(url) = &detailed.poster_url {
      self.images.request(url);
    }
    Ok(detailed)
  }

  pub fn image_status(&self, url: &str) -> Option<ImageStatus> {
    self.images.status(url)
  }

  pub fn materialize<U: TextureUploader + ?Sized>(&self, url: &str, uploader: &mut U) -> Result<Option<TextureId>> {
    self.images.materialize(url, uploader)
  }

  pub fn waker(&self) -> &FrameWaker {
    &self.waker
  }

  /// Stop the loader, join it, then join and discard any search.
  pub async fn shutdown(&mut self) {
    self.images.stop();
    if let Some(handle) = self.loader.take() {
      match tokio::task::spawn_blocking(move || handle.join()).await {
        Ok(Ok(())) => {}
        Ok(Err(_)) => warn!("pipeline: loader thread panicked"),
        Err(e) => warn!(err = %e, "pipeline: failed to join loader"),
      }
    }
    self.search.shutdown().await;
    info!("pipeline: stopped");
  }
}

impl<T: Transport> Drop for Pipeline<T> {
  fn drop(&mut self) {
    self.images.stop();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::decode::RasterDecoder;
  use crate::testing::{CountingUploader, FakeTransport, detail_json, eventually, fake_client, png_bytes, search_json};
  use std::time::Duration;

  const INCEPTION_POSTER: &str = "https://m.media-amazon.com/images/M/inception.jpg";

  fn pipeline(fake: &FakeTransport) -> Pipeline<FakeTransport> {
    Pipeline::start(Arc::new(fake_client(fake)), RasterDecoder, FrameWaker::default()).unwrap()
  }

  async fn next_event(pipeline: &mut Pipeline<FakeTransport>) -> FrameEvent {
    for _ in 0..400 {
      match pipeline.poll_frame().await {
        FrameEvent::Nothing => tokio::time::sleep(Duration::from_millis(5)).await,
        event => return event,
      }
    }
    panic!("search never completed");
  }

  fn inception_fake() -> FakeTransport {
    FakeTransport::default()
      .respond(
        "?s=Inception",
        200,
        search_json(&[
          ("Inception", "2010", INCEPTION_POSTER),
          ("Inception: The Cobol Job", "2011", "N/A"),
          ("Inception: Jump Right Into the Action", "2011", "N/A"),
        ]),
      )
      .respond("?t=Inception", 200, detail_json("Inception", "2010", INCEPTION_POSTER))
      .respond("/images/", 200, png_bytes(6, 9))
  }

  #[tokio::test]
  async fn single_match_flows_through_to_texture() {
    let fake = inception_fake();
    let mut pipeline = pipeline(&fake);

    pipeline.search("Inception", "2010").await;
    let item = match next_event(&mut pipeline).await {
      FrameEvent::AutoSelected(Ok(item)) => item,
      other => panic!("expected auto-select, got {:?}", other),
    };
    assert_eq!(item.director, "Christopher Nolan");
    assert_eq!(fake.hits("?t="), 1);
    assert_eq!(pipeline.results(), std::slice::from_ref(&item));
    assert!(!pipeline.searching());

    assert!(eventually(|| pipeline.image_status(INCEPTION_POSTER) == Some(ImageStatus::Decoded)).await);
    assert!(pipeline.waker().take());

    let mut uploader = CountingUploader::default();
    let id = pipeline.materialize(INCEPTION_POSTER, &mut uploader).unwrap().unwrap();
    assert_eq!(uploader.uploads, vec![(6, 9)]);
    assert_eq!(pipeline.materialize(INCEPTION_POSTER, &mut uploader).unwrap(), Some(id));
    assert_eq!(uploader.uploads.len(), 1);
    assert_eq!(pipeline.image_status(INCEPTION_POSTER), Some(ImageStatus::Ready(id)));

    pipeline.shutdown().await;
  }

  #[tokio::test]
  async fn several_matches_wait_for_user() {
    let fake = inception_fake();
    let mut pipeline = pipeline(&fake);
    pipeline.search("Inception", "").await;
    assert!(matches!(next_event(&mut pipeline).await, FrameEvent::Completed(SearchCompletion::Results(3))));
    assert_eq!(fake.hits("?t="), 0);

    let chosen = pipeline.results()[1].clone();
    let detailed = pipeline.select(&chosen).await.unwrap();
    assert_eq!(detailed.cast.len(), 3);
    assert_eq!(fake.hits("?t="), 1);
    assert!(eventually(|| pipeline.image_status(INCEPTION_POSTER) == Some(ImageStatus::Decoded)).await);
    pipeline.shutdown().await;
  }

  #[tokio::test]
  async fn transport_failure_reports_connection_error() {
    let fake = FakeTransport::default().fail("?s=", "dns lookup failed");
    let mut pipeline = pipeline(&fake);
    pipeline.search("Inception", "").await;
    assert!(matches!(
      next_event(&mut pipeline).await,
      FrameEvent::Completed(SearchCompletion::ConnectionError(_))
    ));
    assert!(pipeline.results().is_empty());
    pipeline.shutdown().await;
  }

  #[tokio::test]
  async fn failed_auto_select_is_reported() {
    let fake = FakeTransport::default()
      .respond("?s=Heat", 200, search_json(&[("Heat", "1995", "N/A")]))
      .respond("?t=Heat", 200, r#"{"Response":"False","Error":"Movie not found!"}"#);
    let mut pipeline = pipeline(&fake);
    pipeline.search("Heat", "").await;
    assert!(matches!(next_event(&mut pipeline).await, FrameEvent::AutoSelected(Err(CatalogError::NotFound))));
    assert_eq!(pipeline.results()[0].director, "");
    pipeline.shutdown().await;
  }

  #[tokio::test]
  async fn back_to_back_searches_keep_only_latest() {
    let fake = FakeTransport::default()
      .respond_after("?s=Alien", Duration::from_millis(50), 200, search_json(&[("Alien", "1979", "N/A")]))
      .respond("?s=Heat", 200, search_json(&[("Heat", "1995", "N/A"), ("Heat", "1986", "N/A")]));
    let mut pipeline = pipeline(&fake);
    pipeline.search("Alien", "").await;
    pipeline.search("Heat", "").await;
    assert!(matches!(next_event(&mut pipeline).await, FrameEvent::Completed(SearchCompletion::Results(2))));
    assert!(pipeline.results().iter().all(|i| i.title == "Heat"));
    let requests = fake.requests();
    assert!(requests[0].contains("?s=Alien"));
    assert!(requests[1].contains("?s=Heat"));
    pipeline.shutdown().await;
  }

  #[tokio::test]
  async fn poster_failure_can_be_retried() {
    let fake = FakeTransport::default()
      .respond("?t=Inception", 200, detail_json("Inception", "2010", INCEPTION_POSTER))
      .respond("/images/", 503, "");
    let pipeline = pipeline(&fake);
    let item = CatalogItem::new("Inception", "2010");

    pipeline.select(&item).await.unwrap();
    assert!(eventually(|| fake.hits("/images/") == 1 && pipeline.image_status(INCEPTION_POSTER).is_none()).await);

    pipeline.select(&item).await.unwrap();
    assert!(eventually(|| fake.hits("/images/") == 2).await);

    let mut pipeline = pipeline;
    pipeline.shutdown().await;
  }

  #[tokio::test]
  async fn shutdown_with_search_in_flight_completes() {
    let fake = FakeTransport::default().respond_after(
      "?s=Heat",
      Duration::from_millis(30),
      200,
      search_json(&[("Heat", "1995", "N/A")]),
    );
    let mut pipeline = pipeline(&fake);
    pipeline.search("Heat", "").await;
    pipeline.shutdown().await;
    assert!(matches!(pipeline.poll_frame().await, FrameEvent::Nothing));
  }
}
