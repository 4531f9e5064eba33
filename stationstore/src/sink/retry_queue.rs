use std::collections::VecDeque;

use crate::config::options::FatalPolicy;
use crate::record::Record;

use super::guard::IoGuard;
use super::{SinkAdapter, SinkError};

/// Records a sink has not committed yet, oldest first.
#[derive(Debug, Default)]
pub struct RetryQueue {
    records: VecDeque<Record>,
}

#[derive(Debug)]
pub struct DrainOutcome {
    pub committed: usize,
    /// Set when a retryable failure stopped the drain early.
    pub interrupted: Option<SinkError>,
}

impl RetryQueue {
    pub fn new() -> RetryQueue {
        RetryQueue::default()
    }

    pub fn enqueue(&mut self, record: Record) {
        self.records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn front(&self) -> Option<&Record> {
        self.records.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Applies the fatal policy to the in-flight head.
    pub fn settle_fatal(&mut self, policy: FatalPolicy) -> Option<Record> {
        match policy {
            FatalPolicy::Drop => self.records.pop_front(),
            FatalPolicy::Hold => None,
        }
    }

    /// Writes queued records oldest first until the queue is empty or a write
    /// fails.
    ///
    /// The head is only removed after its write commits, so an interrupted or
    /// aborted attempt leaves it at the front. A fatal failure settles the head
    /// according to `policy` and is returned.
    pub async fn drain<A: SinkAdapter>(
        &mut self,
        adapter: &mut A,
        handle: &mut A::Handle,
        guard: &IoGuard,
        policy: FatalPolicy,
    ) -> Result<DrainOutcome, SinkError> {
        let sink = adapter.kind();
        let mut committed = 0;
        while let Some(head) = self.records.front().cloned() {
            match guard
                .run(sink, "write", adapter.write_one(handle, &head))
                .await
            {
                Ok(()) => {
                    self.records.pop_front();
                    committed += 1;
                    log::debug!("{sink}: committed record, {} queued", self.records.len());
                }
                Err(e) if e.is_retryable() => {
                    return Ok(DrainOutcome {
                        committed,
                        interrupted: Some(e),
                    });
                }
                Err(e) => {
                    if let Some(dropped) = self.settle_fatal(policy) {
                        log::error!("{sink}: dropping record after fatal failure: {dropped:?}");
                    }
                    return Err(e);
                }
            }
        }
        Ok(DrainOutcome {
            committed,
            interrupted: None,
        })
    }
}
