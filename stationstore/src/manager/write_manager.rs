use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::config::db_config::DbConfig;
use crate::config::options::{ManagerOptions, StoreConfig};
use crate::record::{Record, Schema};
use crate::sink::csv_sink::CsvSink;
use crate::sink::guard::IoGuard;
use crate::sink::jsonl_sink::JsonlSink;
use crate::sink::postgres_sink::PostgresSink;
use crate::sink::{SinkAdapter, SinkError, SinkKind};

use super::managed_sink::{ManagedSink, Phase, SinkReport, SinkSlot};
use super::ManagerError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    pub sinks: Vec<SinkReport>,
}

impl UpdateReport {
    pub fn get(&self, kind: SinkKind) -> Option<&SinkReport> {
        self.sinks.iter().find(|report| report.kind == kind)
    }

    pub fn committed(&self) -> usize {
        self.sinks.iter().map(|report| report.committed).sum()
    }

    pub fn has_backlog(&self) -> bool {
        self.sinks.iter().any(|report| report.backlog > 0)
    }
}

/// Feeds every enabled sink from one producer.
///
/// Each `update` enqueues the record on every sink, then runs each sink's
/// open, drain and close cycle. Sinks progress independently: a sink that
/// cannot be reached keeps its backlog and is retried on the next update,
/// while the others carry on. Only fatal failures reach the caller.
pub struct WriteManager {
    schema: Schema,
    options: ManagerOptions,
    guard: IoGuard,
    cancel: CancellationToken,
    sinks: Vec<Box<dyn ManagedSink>>,
}

impl WriteManager {
    /// A manager with no sinks attached yet.
    pub fn new(schema: Schema, options: ManagerOptions) -> WriteManager {
        let cancel = CancellationToken::new();
        WriteManager {
            schema,
            options,
            guard: IoGuard::new(options.io_timeout, cancel.clone()),
            cancel,
            sinks: Vec::new(),
        }
    }

    /// Builds and provisions one sink per enabled option. Sinks that are not
    /// configured are never touched.
    pub async fn from_config(
        schema: Schema,
        config: &StoreConfig,
        options: ManagerOptions,
    ) -> Result<WriteManager, ManagerError> {
        let mut manager = WriteManager::new(schema, options);

        if config.mariadb {
            let db_config = DbConfig::load(config.db_config.as_deref())?;
            log::info!("relational sink: {db_config:?}");
            let sink = PostgresSink::new(&db_config, &manager.schema, options.io_timeout)
                .map_err(|e| ManagerError::Provision {
                    kind: SinkKind::Relational,
                    source: e,
                })?;
            manager.attach(sink).await?;
        } else if config.db_config.is_some() {
            log::warn!("db_config is ignored while mariadb is disabled");
        }

        if let Some(path) = &config.flat_config {
            manager.attach(JsonlSink::new(path)).await?;
        }

        if let Some(path) = &config.csv_config {
            manager.attach(CsvSink::new(path)).await?;
        }

        if manager.sinks.is_empty() {
            log::warn!("no sinks are enabled; records will not be stored");
        }
        Ok(manager)
    }

    /// Provisions `adapter` and adds it with an empty queue. At most one sink
    /// of each kind.
    pub async fn attach<A>(&mut self, mut adapter: A) -> Result<(), ManagerError>
    where
        A: SinkAdapter + 'static,
    {
        let kind = adapter.kind();
        if self.sinks.iter().any(|sink| sink.kind() == kind) {
            return Err(ManagerError::DuplicateSink(kind));
        }
        self.guard
            .run(kind, "provision", adapter.provision(&self.schema))
            .await
            .map_err(|source| ManagerError::Provision { kind, source })?;
        log::info!("{kind} sink enabled");
        self.sinks.push(Box::new(SinkSlot::new(adapter)));
        Ok(())
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn options(&self) -> ManagerOptions {
        self.options
    }

    pub fn enabled(&self) -> Vec<SinkKind> {
        self.sinks.iter().map(|sink| sink.kind()).collect()
    }

    /// `None` when the kind is not enabled.
    pub fn queue_depth(&self, kind: SinkKind) -> Option<usize> {
        self.sink(kind).map(|sink| sink.queue_depth())
    }

    pub fn phase(&self, kind: SinkKind) -> Option<Phase> {
        self.sink(kind).map(|sink| sink.phase())
    }

    /// Cancelling this token aborts in-flight opens and writes. Aborted
    /// records stay at the front of their queues.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn sink(&self, kind: SinkKind) -> Option<&dyn ManagedSink> {
        self.sinks
            .iter()
            .find(|sink| sink.kind() == kind)
            .map(|sink| sink.as_ref())
    }

    fn check_shape(&self, record: &Record) -> Result<(), ManagerError> {
        if record.fits(&self.schema) {
            Ok(())
        } else {
            Err(ManagerError::RecordShape {
                expected: self.schema.len(),
                actual: record.len(),
            })
        }
    }

    /// Runs one cycle on every enabled sink and returns once each has been
    /// attempted. Unreachable sinks are reported in the result, not as errors.
    /// The first fatal failure is returned after all sinks finish.
    pub async fn update(&mut self, record: Record) -> Result<UpdateReport, ManagerError> {
        self.check_shape(&record)?;
        let guard = &self.guard;
        let policy = self.options.fatal_policy;
        let results = join_all(
            self.sinks
                .iter_mut()
                .map(|sink| sink.cycle(record.clone(), guard, policy)),
        )
        .await;

        let mut report = UpdateReport::default();
        let mut fatal: Option<SinkError> = None;
        for result in results {
            match result {
                Ok(sink_report) => report.sinks.push(sink_report),
                Err(e) => {
                    log::error!("{}: fatal failure: {e}", e.sink());
                    fatal.get_or_insert(e);
                }
            }
        }
        match fatal {
            Some(e) => Err(e.into()),
            None => Ok(report),
        }
    }

    /// Writes `record` straight to every enabled sink, bypassing the queues.
    /// Any failure, retryable or not, is returned; the other sinks are still
    /// attempted.
    pub async fn update_single(&mut self, record: Record) -> Result<(), ManagerError> {
        self.check_shape(&record)?;
        let guard = &self.guard;
        let results = join_all(
            self.sinks
                .iter_mut()
                .map(|sink| sink.write_single(&record, guard)),
        )
        .await;
        let mut first: Option<SinkError> = None;
        for e in results.into_iter().filter_map(Result::err) {
            log::warn!("{}: single write failed: {e}", e.sink());
            first.get_or_insert(e);
        }
        match first {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Like `update_single`, for one sink, so a caller with its own backoff
    /// can retry exactly the sink that failed.
    pub async fn update_single_to(
        &mut self,
        kind: SinkKind,
        record: Record,
    ) -> Result<(), ManagerError> {
        self.check_shape(&record)?;
        let guard = &self.guard;
        let sink = self
            .sinks
            .iter_mut()
            .find(|sink| sink.kind() == kind)
            .ok_or(ManagerError::NotEnabled(kind))?;
        Ok(sink.write_single(&record, guard).await?)
    }
}
