//! Scripted collaborators shared by the unit tests.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::app::App;
use crate::catalog::{CatalogClient, HttpResponse, Transport, TransportError};
use crate::config::Config;
use crate::decode::{DecodedImage, RasterDecoder};
use crate::image_cache::{TextureId, TextureUploader};
use crate::loader::FrameWaker;
use crate::pipeline::Pipeline;
use crate::watchlist::WatchList;

#[derive(Clone)]
enum Reply {
  Respond(u16, Vec<u8>),
  Fail(String),
}

#[derive(Clone)]
struct Route {
  needle: String,
  reply: Reply,
  delay: Option<Duration>,
}

#[derive(Default)]
struct FakeState {
  routes: Vec<Route>,
  requests: Vec<String>,
}

/// Answers GETs from routes matched by substring, first match wins. Unmatched URLs get a 404.
#[derive(Clone, Default)]
pub struct FakeTransport {
  state: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
  fn route(self, needle: &str, reply: Reply, delay: Option<Duration>) -> Self {
    self.state.lock().unwrap().routes.push(Route { needle: needle.to_string(), reply, delay });
    self
  }

  pub fn respond(self, needle: &str, status: u16, body: impl Into<Vec<u8>>) -> Self {
    self.route(needle, Reply::Respond(status, body.into()), None)
  }

  pub fn respond_after(self, needle: &str, delay: Duration, status: u16, body: impl Into<Vec<u8>>) -> Self {
    self.route(needle, Reply::Respond(status, body.into()), Some(delay))
  }

  pub fn fail(self, needle: &str, message: &str) -> Self {
    self.route(needle, Reply::Fail(message.to_string()), None)
  }

  pub fn hits(&self, needle: &str) -> usize {
    self.state.lock().unwrap().requests.iter().filter(|url| url.contains(needle)).count()
  }

  pub fn total_hits(&self) -> usize {
    self.state.lock().unwrap().requests.len()
  }

  pub fn requests(&self) -> Vec<String> {
    self.state.lock().unwrap().requests.clone()
  }
}

impl Transport for FakeTransport {
  async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
    let route = {
      let mut state = self.state.lock().unwrap();
      state.requests.push(url.to_string());
      state.routes.iter().find(|r| url.contains(&r.needle)).cloned()
    };
    let Some(route) = route else {
      return Ok(HttpResponse { status: 404, body: Vec::new() });
    };
    if let Some(delay) = route.delay {
      tokio::time::sleep(delay).await;
    }
    match route.reply {
      Reply::Respond(status, body) => Ok(HttpResponse { status, body }),
      Reply::Fail(message) => Err(TransportError(message)),
    }
  }
}

pub fn fake_client(fake: &FakeTransport) -> CatalogClient<FakeTransport> {
  CatalogClient::new(fake.clone(), fake.clone(), "test-key").with_endpoints("http://catalog.test", "http://img.test")
}

pub fn search_json(hits: &[(&str, &str, &str)]) -> Vec<u8> {
  let search: Vec<serde_json::Value> = hits
    .iter()
    .map(|(title, year, poster)| serde_json::json!({ "Title": title, "Year": year, "Poster": poster, "Type": "movie" }))
    .collect();
  serde_json::json!({ "Response": "True", "Search": search, "totalResults": hits.len().to_string() }).to_string().into_bytes()
}

pub fn detail_json(title: &str, year: &str, poster: &str) -> Vec<u8> {
  serde_json::json!({
    "Response": "True",
    "Title": title,
    "Year": year,
    "Director": "Christopher Nolan",
    "Runtime": "148 min",
    "imdbRating": "8.8",
    "imdbVotes": "2,600,000",
    "Genre": "Action, Adventure, Sci-Fi",
    "Actors": "Leonardo DiCaprio, Joseph Gordon-Levitt, Elliot Page",
    "Poster": poster,
  })
  .to_string()
  .into_bytes()
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
  let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 40, 40])));
  let mut buf = Vec::new();
  image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
  buf
}

pub fn rgba_png_bytes(width: u32, height: u32) -> Vec<u8> {
  let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 128])));
  let mut buf = Vec::new();
  image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
  buf
}

pub fn decoded(width: u32, height: u32) -> DecodedImage {
  DecodedImage { pixels: vec![7; (width * height * 3) as usize], width, height, channels: 3 }
}

/// Records uploads instead of touching a terminal.
#[derive(Default)]
pub struct CountingUploader {
  pub uploads: Vec<(u32, u32)>,
  pub attempts: usize,
  pub fail: bool,
}

impl TextureUploader for CountingUploader {
  fn upload(&mut self, image: &DecodedImage) -> anyhow::Result<TextureId> {
    self.attempts += 1;
    if self.fail {
      anyhow::bail!("upload refused");
    }
    self.uploads.push((image.width, image.height));
    Ok(TextureId(self.uploads.len() as u32))
  }
}

/// Poll `check` every few milliseconds until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
  for _ in 0..400 {
    if check() {
      return true;
    }
    tokio::time::sleep(Duration::from_millis(5)).await;
  }
  check()
}

/// An app wired to `fake`, with its watch list and preferences in a fresh temp dir.
pub fn test_app(fake: FakeTransport) -> (App<FakeTransport>, tempfile::TempDir) {
  let dir = tempfile::tempdir().unwrap();
  let pipeline = Pipeline::start(Arc::new(fake_client(&fake)), RasterDecoder, FrameWaker::default()).unwrap();
  let watchlist = WatchList::new(dir.path().join("users"));
  let app = App::new(pipeline, watchlist, Config::default(), Some(dir.path().join("prefs.toml")));
  (app, dir)
}
