//! Update sources.
//!
//! An [`UpdateSource`] is where the runtime gets its updates from: a
//! long-polling HTTP client, a message queue, a file. The runtime only needs
//! one operation, [`fetch`](UpdateSource::fetch), with Telegram's offset
//! semantics: every update with an id below `offset` has been seen and
//! must not be returned again.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use parley_core::Update;

use crate::error::SourceError;

/// A producer of update batches.
#[async_trait]
pub trait UpdateSource: Send {
    /// Returns the pending updates with `update_id >= offset`.
    ///
    /// May wait up to `timeout` for updates to arrive. An empty batch means
    /// nothing is pending.
    async fn fetch(&mut self, offset: i64, timeout: Duration) -> Result<Vec<Update>, SourceError>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    batches: VecDeque<Result<Vec<Update>, String>>,
    offsets: Vec<i64>,
}

/// An in-memory source replaying scripted batches.
///
/// Each `fetch` hands out the next queued batch, dropping updates below the
/// requested offset, and returns an empty batch once the queue is drained.
/// Clones share the same queue, so a test can keep a handle to push more
/// batches or inspect the offsets the runtime asked for.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemorySource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source with the given batches queued.
    pub fn with_batches(batches: impl IntoIterator<Item = Vec<Update>>) -> Self {
        let source = Self::new();
        for batch in batches {
            source.push_batch(batch);
        }
        source
    }

    /// Queues a batch.
    pub fn push_batch(&self, batch: Vec<Update>) {
        self.inner.lock().batches.push_back(Ok(batch));
    }

    /// Queues a failed fetch.
    pub fn push_error(&self, message: impl Into<String>) {
        self.inner.lock().batches.push_back(Err(message.into()));
    }

    /// Returns the number of batches not yet fetched.
    pub fn pending(&self) -> usize {
        self.inner.lock().batches.len()
    }

    /// Returns the offsets passed to every `fetch` so far.
    pub fn offsets(&self) -> Vec<i64> {
        self.inner.lock().offsets.clone()
    }
}

#[async_trait]
impl UpdateSource for MemorySource {
    async fn fetch(&mut self, offset: i64, _timeout: Duration) -> Result<Vec<Update>, SourceError> {
        let mut inner = self.inner.lock();
        inner.offsets.push(offset);

        match inner.batches.pop_front() {
            Some(Ok(batch)) => Ok(batch
                .into_iter()
                .filter(|update| update.update_id >= offset)
                .collect()),
            Some(Err(message)) => Err(SourceError::Rejected(message)),
            None => Ok(Vec::new()),
        }
    }
}
