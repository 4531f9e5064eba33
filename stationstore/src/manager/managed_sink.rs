use async_trait::async_trait;

use crate::config::options::FatalPolicy;
use crate::record::Record;
use crate::sink::guard::IoGuard;
use crate::sink::retry_queue::RetryQueue;
use crate::sink::{SinkAdapter, SinkError, SinkKind};

/// Where a sink is in its update cycle. Between updates every sink is `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Opening,
    Draining,
    Closing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkReport {
    pub kind: SinkKind,
    /// Records committed during this cycle, including older backlog.
    pub committed: usize,
    /// Records still queued after the cycle.
    pub backlog: usize,
    /// The sink could not be reached or stopped part way; the backlog waits
    /// for the next update.
    pub deferred: bool,
}

/// A sink slot the manager drives without knowing the adapter type.
#[async_trait]
pub trait ManagedSink: Send {
    fn kind(&self) -> SinkKind;

    fn phase(&self) -> Phase;

    fn queue_depth(&self) -> usize;

    /// Enqueue, open, drain, close.
    async fn cycle(
        &mut self,
        record: Record,
        guard: &IoGuard,
        policy: FatalPolicy,
    ) -> Result<SinkReport, SinkError>;

    /// Open, write this one record, close. The queue is not touched.
    async fn write_single(&mut self, record: &Record, guard: &IoGuard) -> Result<(), SinkError>;
}

/// One adapter with its own retry queue.
pub struct SinkSlot<A: SinkAdapter> {
    adapter: A,
    queue: RetryQueue,
    phase: Phase,
}

impl<A: SinkAdapter> SinkSlot<A> {
    pub fn new(adapter: A) -> SinkSlot<A> {
        SinkSlot {
            adapter,
            queue: RetryQueue::new(),
            phase: Phase::Idle,
        }
    }

    fn enter(&mut self, phase: Phase) {
        log::trace!("{}: {:?} -> {:?}", self.adapter.kind(), self.phase, phase);
        self.phase = phase;
    }

    async fn open(&mut self, guard: &IoGuard) -> Result<A::Handle, SinkError> {
        self.enter(Phase::Opening);
        let opened = guard
            .run(self.adapter.kind(), "open", self.adapter.open())
            .await;
        if opened.is_err() {
            self.enter(Phase::Idle);
        }
        opened
    }

    /// Always runs, bounded by the guard's timeout, and never fails.
    async fn close(&mut self, handle: A::Handle, guard: &IoGuard) {
        let kind = self.adapter.kind();
        self.enter(Phase::Closing);
        if tokio::time::timeout(guard.timeout(), self.adapter.close(handle))
            .await
            .is_err()
        {
            log::warn!("{kind}: close timed out, handle abandoned");
        }
        self.enter(Phase::Idle);
    }
}

#[async_trait]
impl<A> ManagedSink for SinkSlot<A>
where
    A: SinkAdapter + 'static,
{
    fn kind(&self) -> SinkKind {
        self.adapter.kind()
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    async fn cycle(
        &mut self,
        record: Record,
        guard: &IoGuard,
        policy: FatalPolicy,
    ) -> Result<SinkReport, SinkError> {
        let kind = self.adapter.kind();
        self.queue.enqueue(record);

        let mut handle = match self.open(guard).await {
            Ok(handle) => handle,
            Err(e) if e.is_retryable() => {
                log::warn!(
                    "{kind}: {e}; {} record(s) held for the next update",
                    self.queue.len()
                );
                return Ok(SinkReport {
                    kind,
                    committed: 0,
                    backlog: self.queue.len(),
                    deferred: true,
                });
            }
            Err(e) => {
                if let Some(dropped) = self.queue.settle_fatal(policy) {
                    log::error!("{kind}: dropping record after fatal open failure: {dropped:?}");
                }
                return Err(e);
            }
        };

        if self.queue.len() > 1 {
            log::warn!("{kind}: {} records queued", self.queue.len());
        }

        self.enter(Phase::Draining);
        let drained = self
            .queue
            .drain(&mut self.adapter, &mut handle, guard, policy)
            .await;
        self.close(handle, guard).await;

        let outcome = drained?;
        if let Some(e) = &outcome.interrupted {
            log::warn!(
                "{kind}: {e}; {} record(s) held for the next update",
                self.queue.len()
            );
        }
        Ok(SinkReport {
            kind,
            committed: outcome.committed,
            backlog: self.queue.len(),
            deferred: outcome.interrupted.is_some(),
        })
    }

    async fn write_single(&mut self, record: &Record, guard: &IoGuard) -> Result<(), SinkError> {
        let kind = self.adapter.kind();
        let mut handle = self.open(guard).await?;
        self.enter(Phase::Draining);
        let written = guard
            .run(kind, "write", self.adapter.write_one(&mut handle, record))
            .await;
        self.close(handle, guard).await;
        written
    }
}
