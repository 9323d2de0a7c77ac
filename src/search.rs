use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogClient, CatalogItem, Transport};
use crate::queue::{Producer, TransferQueue};

/// What a search task streams to the frame loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
  Found(CatalogItem),
  Failed(String),
}

/// How a search session ended, reported once when it leaves the searching state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCompletion {
  Results(usize),
  /// Exactly one match; the caller is expected to select it right away.
  Single(CatalogItem),
  NoResults,
  ConnectionError(String),
}

/// Runs one catalog search at a time on a background task and collects its
/// results as the frame loop drains them.
pub struct SearchOrchestrator<T> {
  client: Arc<CatalogClient<T>>,
  queue: Arc<TransferQueue<SearchEvent>>,
  task: Option<JoinHandle<()>>,
  in_progress: bool,
  results: Vec<CatalogItem>,
  connection_error: Option<String>,
}

impl<T: Transport> SearchOrchestrator<T> {
  pub fn new(client: Arc<CatalogClient<T>>) -> Self {
    Self {
      client,
      queue: Arc::new(TransferQueue::new()),
      task: None,
      in_progress: false,
      results: Vec::new(),
      connection_error: None,
    }
  }

  pub fn in_progress(&self) -> bool {
    self.in_progress
  }

  pub fn results(&self) -> &[CatalogItem] {
    &self.results
  }

  #[cfg(test)]
  pub fn connection_error(&self) -> Option<&str> {
    self.connection_error.as_deref()
  }

  #[cfg(test)]
  pub fn queue(&self) -> &Arc<TransferQueue<SearchEvent>> {
    &self.queue
  }

  /// Swap in a richer copy of a result (e.g. after a detail fetch).
  pub fn replace_result(&mut self, index: usize, item: CatalogItem) {
    if let Some(slot) = self.results.get_mut(index) {
      *slot = item;
    }
  }

  /// Begin a new session. Any previous task is joined first, which stalls the
  /// caller until that request finishes.
  pub async fn start(&mut self, title: &str, year: &str) {
    self.join().await;
    self.queue.clear();
    self.results.clear();
    self.connection_error = None;
    self.in_progress = true;

    let producer = self.queue.producer();
    let client = Arc::clone(&self.client);
    let title = title.to_string();
    let year = year.to_string();
    info!(title = %title, year = %year, "search: started");
    self.task = Some(tokio::spawn(async move {
      run_search(&client, &producer, &title, &year).await;
    }));
  }

  /// Non-blocking per-frame drain. Returns the completion on the frame the
  /// session finishes, `None` otherwise.
  pub fn drain(&mut self) -> Option<SearchCompletion> {
    if !self.in_progress {
      return None;
    }
    // Every push of a session happens before its latch, so reading the latch
    // first and then popping to empty sees the whole session.
    let finished = self.queue.is_finished();
    while let Some(event) = self.queue.pop() {
      match event {
        SearchEvent::Found(item) => self.results.push(item),
        SearchEvent::Failed(msg) => self.connection_error = Some(msg),
      }
    }
    if !finished {
      return None;
    }
    self.in_progress = false;
    let completion = if let Some(msg) = &self.connection_error {
      SearchCompletion::ConnectionError(msg.clone())
    } else {
      match self.results.as_slice() {
        [] => SearchCompletion::NoResults,
        [only] => SearchCompletion::Single(only.clone()),
        many => SearchCompletion::Results(many.len()),
      }
    };
    debug!(?completion, "search: session finished");
    Some(completion)
  }

  async fn join(&mut self) {
    if let Some(handle) = self.task.take()
      && let Err(e) = handle.await
    {
      warn!(err = %e, "search: task ended abnormally");
    }
  }

  /// Join any in-flight task and discard whatever it left undrained.
  pub async fn shutdown(&mut self) {
    self.join().await;
    if !self.queue.is_empty() {
      debug!("search: discarding undrained results");
    }
    self.queue.clear();
    self.in_progress = false;
  }
}

async fn run_search<T: Transport>(client: &CatalogClient<T>, producer: &Producer<SearchEvent>, title: &str, year: &str) {
  if !producer.is_current() {
    return;
  }
  match client.search(title, year).await {
    Ok(items) => {
      debug!(count = items.len(), "search: catalog answered");
      for item in items {
        if !producer.push(SearchEvent::Found(item)) {
          debug!(title = %title, "search: session superseded, dropping results");
          return;
        }
      }
    }
    Err(e) => {
      warn!(title = %title, err = %e, "search: request failed");
      producer.push(SearchEvent::Failed(e.to_string()));
    }
  }
  producer.set_finished();
}
