//! Transfer queue between a background producer and the frame loop.
//!
//! The frame loop never blocks on it: `pop` either hands back the oldest
//! item or reports nothing. A producer signals completion with the
//! `finished` latch, which stays set until the next `clear`.
//!
//! Every `clear` starts a new generation. A [`Producer`] is bound to the
//! generation that was current when it was created, and its writes are
//! dropped once the queue has moved on, so a superseded search can never
//! leak items into the next one.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

struct Inner<T> {
  items: VecDeque<T>,
  finished: bool,
  generation: u64,
}

pub struct TransferQueue<T> {
  inner: Mutex<Inner<T>>,
}

impl<T> Default for TransferQueue<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> TransferQueue<T> {
  pub fn new() -> Self {
    Self { inner: Mutex::new(Inner { items: VecDeque::new(), finished: false, generation: 0 }) }
  }

  fn lock(&self) -> MutexGuard<'_, Inner<T>> {
    self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  pub fn pop(&self) -> Option<T> {
    self.lock().items.pop_front()
  }

  pub fn is_finished(&self) -> bool {
    self.lock().finished
  }

  pub fn is_empty(&self) -> bool {
    self.lock().items.is_empty()
  }

  /// Empty the queue, reset the finished latch and start a new generation.
  pub fn clear(&self) {
    let mut inner = self.lock();
    inner.items.clear();
    inner.finished = false;
    inner.generation = inner.generation.wrapping_add(1);
  }

  /// A write handle bound to the current generation.
  pub fn producer(self: &Arc<Self>) -> Producer<T> {
    Producer { queue: Arc::clone(self), generation: self.lock().generation }
  }
}

/// Generation-checked write side of a [`TransferQueue`]. Writes from the
/// current generation always succeed.
pub struct Producer<T> {
  queue: Arc<TransferQueue<T>>,
  generation: u64,
}

impl<T> Producer<T> {
  /// Returns `false` (and drops the item) if the queue was cleared since this producer was made.
  pub fn push(&self, item: T) -> bool {
    let mut inner = self.queue.lock();
    if inner.generation != self.generation {
      return false;
    }
    inner.items.push_back(item);
    true
  }

  pub fn set_finished(&self) -> bool {
    let mut inner = self.queue.lock();
    if inner.generation != self.generation {
      return false;
    }
    inner.finished = true;
    true
  }

  pub fn is_current(&self) -> bool {
    self.queue.lock().generation == self.generation
  }
}
