use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Statement};

use crate::config::db_config::DbConfig;
use crate::postgres_things::ddl::insert_statement;
use crate::record::{Record, Schema};

use super::sink_error::is_connectivity_error;
use super::{SinkAdapter, SinkError, SinkKind};

const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Writes each record as one row through a fixed INSERT built at
/// construction. The table is never created or altered.
pub struct PostgresSink {
    config: tokio_postgres::Config,
    insert: String,
    target: String,
}

pub struct PostgresHandle {
    client: Client,
    statement: Statement,
    connection: JoinHandle<Result<(), tokio_postgres::Error>>,
}

impl PostgresSink {
    pub fn new(
        db_config: &DbConfig,
        schema: &Schema,
        connect_timeout: Duration,
    ) -> Result<PostgresSink, SinkError> {
        let insert = insert_statement(&db_config.db_table, schema)?;
        log::debug!("relational insert: {insert}");
        Ok(PostgresSink {
            config: db_config.connect_config(connect_timeout),
            insert,
            target: format!(
                "{}@{}:{}/{}",
                db_config.username, db_config.host, db_config.port, db_config.db_name
            ),
        })
    }

    pub fn insert(&self) -> &str {
        &self.insert
    }

    fn error(inner: tokio_postgres::Error) -> SinkError {
        SinkError::Postgres {
            sink: SinkKind::Relational,
            inner,
        }
    }
}

#[async_trait]
impl SinkAdapter for PostgresSink {
    type Handle = PostgresHandle;

    fn kind(&self) -> SinkKind {
        SinkKind::Relational
    }

    /// Probes the database once. The station must not start against a
    /// database it cannot reach, so every failure here is fatal.
    async fn provision(&mut self, _schema: &Schema) -> Result<(), SinkError> {
        log::info!("initial connection to {}", self.target);
        match self.open().await {
            Ok(handle) => {
                self.close(handle).await;
                log::info!("initial connection to {} passed", self.target);
                Ok(())
            }
            Err(e) => Err(SinkError::fatal(
                SinkKind::Relational,
                format!("initial connection to {} failed: {e}", self.target),
            )),
        }
    }

    async fn open(&mut self) -> Result<PostgresHandle, SinkError> {
        log::trace!("connecting to {}", self.target);
        let (client, connection) = self.config.connect(NoTls).await.map_err(|e| {
            // Refused, reset or timed out; bad client settings stay fatal.
            if is_connectivity_error(&e) {
                SinkError::retryable(
                    SinkKind::Relational,
                    format!("connecting to {} failed: {e}", self.target),
                )
            } else {
                Self::error(e)
            }
        })?;
        let connection = tokio::spawn(connection);

        match client.prepare(&self.insert).await {
            Ok(statement) => Ok(PostgresHandle {
                client,
                statement,
                connection,
            }),
            Err(e) => {
                drop(client);
                connection.abort();
                Err(Self::error(e))
            }
        }
    }

    async fn write_one(
        &mut self,
        handle: &mut PostgresHandle,
        record: &Record,
    ) -> Result<(), SinkError> {
        let params: Vec<&(dyn ToSql + Sync)> = record
            .values()
            .iter()
            .map(|value| value as &(dyn ToSql + Sync))
            .collect();
        let rows = handle
            .client
            .execute(&handle.statement, &params)
            .await
            .map_err(Self::error)?;
        log::trace!("inserted {rows} row(s)");
        Ok(())
    }

    async fn close(&mut self, handle: PostgresHandle) {
        let PostgresHandle {
            client,
            statement,
            mut connection,
        } = handle;
        drop(statement);
        drop(client);
        match tokio::time::timeout(CLOSE_GRACE, &mut connection).await {
            Ok(Ok(Ok(()))) => log::trace!("closed connection to {}", self.target),
            Ok(Ok(Err(e))) => log::warn!("connection to {} ended badly: {e}", self.target),
            Ok(Err(e)) => log::warn!("connection task for {} failed: {e}", self.target),
            Err(_) => {
                log::warn!("connection to {} did not close in time", self.target);
                connection.abort();
            }
        }
    }
}
