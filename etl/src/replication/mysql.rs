use config::shared::{IntoConnectOptions, MySqlConnectionConfig};
use futures::StreamExt;
use mysql_async::binlog::events::{Event, EventData, RowsEventData, TableMapEvent};
use mysql_async::binlog::row::BinlogRow;
use mysql_async::{BinlogStream, BinlogStreamRequest, Conn, Opts};
use sqlx::MySqlPool;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::conversions::value::binlog_value_to_cell;
use crate::error::{EtlError, ErrorKind, EtlResult};
use crate::replication::stream::{ReplicationSource, ReplicationStream, StreamRequest};
use crate::schema::{SchemaCache, TableSchema, get_table_schema};
use crate::types::{
    BINLOG_HEADER_SIZE, BinlogEvent, BinlogPosition, RawRow, RowKind, RowValues, RowsEvent,
};
use crate::{bail, etl_error};

/// Maximum number of connections used for metadata queries.
const METADATA_POOL_MAX_CONNECTIONS: u32 = 1;

/// [`ReplicationSource`] reading the binlog of a MySQL server as a replica.
///
/// The binlog is read with a dedicated `mysql_async` connection, column metadata is read
/// from `information_schema` through a separate `sqlx` pool.
#[derive(Debug, Clone)]
pub struct MySqlReplicationSource {
    config: MySqlConnectionConfig,
}

impl MySqlReplicationSource {
    pub fn new(config: MySqlConnectionConfig) -> Self {
        Self { config }
    }

    async fn connect_metadata_pool(&self) -> EtlResult<MySqlPool> {
        let options: MySqlConnectOptions = self.config.with_db();
        let pool = MySqlPoolOptions::new()
            .max_connections(METADATA_POOL_MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        Ok(pool)
    }
}

impl ReplicationSource for MySqlReplicationSource {
    type Stream = MySqlReplicationStream;

    async fn open(&self, request: StreamRequest) -> EtlResult<MySqlReplicationStream> {
        let pool = self.connect_metadata_pool().await?;

        let schemas = SchemaCache::new();
        for table in &request.tables {
            let table_schema = get_table_schema(&pool, &self.config.name, table).await?;
            check_identifier_column(
                &table_schema,
                &request.satellite_tables,
                &request.identifier_column,
            )?;
            debug!(
                table = %table,
                columns = table_schema.column_count(),
                "loaded table schema"
            );
            schemas.add_table_schema(table_schema).await;
        }

        let opts: Opts = self.config.with_db();
        let conn = Conn::new(opts).await?;

        let (log_file, log_position) = start_position(&request);
        let binlog_request = BinlogStreamRequest::new(request.server_id)
            .with_filename(log_file.as_bytes())
            .with_pos(log_position);
        let stream = conn.get_binlog_stream(binlog_request).await?;

        info!(
            host = %self.config.host,
            database = %self.config.name,
            server_id = request.server_id,
            resume = request.resume,
            log_file = %log_file,
            log_position,
            "opened binlog stream"
        );

        Ok(MySqlReplicationStream {
            stream,
            pool,
            database: self.config.name.clone(),
            tables: request.tables,
            satellite_tables: request.satellite_tables,
            identifier_column: request.identifier_column,
            schemas,
            log_file: request.resume.then_some(log_file),
            log_position,
            pending: None,
            table_map_seen: false,
            schema_refreshed: false,
            closed: false,
        })
    }
}

/// Returns the binlog file and offset requested when opening a stream.
///
/// An empty file name starts from the oldest binlog retained by the server.
fn start_position(request: &StreamRequest) -> (String, u64) {
    match request.resume_position() {
        Some(position) => (position.log_file.clone(), position.log_position),
        None => (String::new(), BINLOG_HEADER_SIZE),
    }
}

/// Returns the stream position after an event whose header reports `header_log_pos`.
///
/// Rotations switch to the file and offset they announce. Artificial events report a zero
/// offset and leave the position unchanged.
fn next_position(
    log_file: Option<String>,
    log_position: u64,
    header_log_pos: u32,
    rotation: Option<&BinlogPosition>,
) -> (Option<String>, u64) {
    match rotation {
        Some(position) => (Some(position.log_file.clone()), position.log_position),
        None if header_log_pos != 0 => (log_file, u64::from(header_log_pos)),
        None => (log_file, log_position),
    }
}

/// Fails when a satellite table lacks the column linking its rows to the master.
fn check_identifier_column(
    table_schema: &TableSchema,
    satellite_tables: &BTreeSet<String>,
    identifier_column: &str,
) -> EtlResult<()> {
    if satellite_tables.contains(&table_schema.name) && !table_schema.has_column(identifier_column)
    {
        bail!(
            ErrorKind::SourceSchemaError,
            "Satellite table lacks the identifier column",
            format!(
                "Satellite table '{}' has no column '{identifier_column}', deleted rows could not be linked to the master",
                table_schema.name
            )
        );
    }

    Ok(())
}

/// Result of decoding a single raw binlog event.
enum Step {
    Event(BinlogEvent),
    Skipped,
}

/// What to do with the buffered event once it was inspected.
enum Outcome {
    Decoded(Step),
    /// The table schema was reloaded, the same event is decoded again.
    Retry,
    Failed(EtlError),
}

/// Table targeted by a rows event.
#[derive(Debug)]
enum RowsTarget {
    Tracked { table: String, column_count: usize },
    Ignored,
}

/// Binlog stream of a MySQL server, filtered to the tracked tables.
pub struct MySqlReplicationStream {
    stream: BinlogStream,
    pool: MySqlPool,
    database: String,
    tables: BTreeSet<String>,
    satellite_tables: BTreeSet<String>,
    identifier_column: String,
    schemas: SchemaCache,
    log_file: Option<String>,
    log_position: u64,
    /// Raw event read from the connection and not yet yielded.
    pending: Option<Event>,
    /// Whether a table map event was read since the stream was opened.
    table_map_seen: bool,
    schema_refreshed: bool,
    closed: bool,
}

impl ReplicationStream for MySqlReplicationStream {
    async fn next_event(&mut self) -> Option<EtlResult<BinlogEvent>> {
        loop {
            if self.pending.is_none() {
                match self.stream.next().await {
                    Some(Ok(event)) => self.pending = Some(event),
                    Some(Err(err)) => {
                        self.closed = true;
                        return Some(Err(err.into()));
                    }
                    None => {
                        self.closed = true;
                        return None;
                    }
                }
            }

            // The event stays buffered until it is decoded, so that a dropped future does
            // not lose it.
            let Some(event) = self.pending.as_ref() else {
                continue;
            };
            let header_log_pos = event.header().log_pos();

            let outcome = match read_event_data(event) {
                Err(err) => Outcome::Failed(err),
                Ok(None) => Outcome::Decoded(Step::Skipped),
                Ok(Some(EventData::TableMapEvent(_))) => {
                    self.table_map_seen = true;
                    Outcome::Decoded(Step::Skipped)
                }
                Ok(Some(EventData::RowsEvent(rows_data))) => {
                    let target = rows_target(
                        &self.stream,
                        &rows_data,
                        &self.database,
                        &self.tables,
                        self.table_map_seen,
                    );

                    match target {
                        Err(err) => Outcome::Failed(err),
                        Ok(RowsTarget::Ignored) => Outcome::Decoded(Step::Skipped),
                        Ok(RowsTarget::Tracked {
                            table,
                            column_count,
                        }) => match self.schemas.get_table_schema(&table).await {
                            Some(table_schema) if table_schema.column_count() == column_count => {
                                match decode_rows(&self.stream, &rows_data, &table_schema) {
                                    Ok(rows) => Outcome::Decoded(Step::Event(BinlogEvent::Rows(rows))),
                                    Err(err) => Outcome::Failed(err),
                                }
                            }
                            _ => {
                                let reloaded = reload_table_schema(
                                    &self.pool,
                                    &self.schemas,
                                    &self.database,
                                    &table,
                                    &self.satellite_tables,
                                    &self.identifier_column,
                                    &mut self.schema_refreshed,
                                )
                                .await;

                                match reloaded {
                                    Ok(()) => Outcome::Retry,
                                    Err(err) => Outcome::Failed(err),
                                }
                            }
                        },
                    }
                }
                Ok(Some(data)) => Outcome::Decoded(decode_event(data)),
            };

            let step = match outcome {
                Outcome::Retry => continue,
                Outcome::Failed(err) => {
                    self.pending = None;
                    return Some(Err(err));
                }
                Outcome::Decoded(step) => step,
            };
            self.pending = None;
            self.schema_refreshed = false;

            let rotation = match &step {
                Step::Event(BinlogEvent::Rotation(position)) => Some(position),
                _ => None,
            };
            let (log_file, log_position) = next_position(
                self.log_file.take(),
                self.log_position,
                header_log_pos,
                rotation,
            );
            self.log_file = log_file;
            self.log_position = log_position;

            if let Step::Event(binlog_event) = step {
                return Some(Ok(binlog_event));
            }
        }
    }

    fn position(&self) -> Option<BinlogPosition> {
        self.log_file
            .as_ref()
            .map(|log_file| BinlogPosition::new(log_file.clone(), self.log_position))
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Reloads the schema of `table` after its rows stopped matching the cached columns.
///
/// A second reload without an event decoded in between fails, since the schema in
/// `information_schema` still does not describe the rows.
async fn reload_table_schema(
    pool: &MySqlPool,
    schemas: &SchemaCache,
    database: &str,
    table: &str,
    satellite_tables: &BTreeSet<String>,
    identifier_column: &str,
    schema_refreshed: &mut bool,
) -> EtlResult<()> {
    if *schema_refreshed {
        bail!(
            ErrorKind::SourceSchemaError,
            "Binlog row does not match the table schema",
            format!(
                "Rows of table '{table}' do not match its columns in information_schema, the table was altered or binlog_row_image is not FULL"
            )
        );
    }

    schemas.remove_table_schema(table).await;
    let table_schema = get_table_schema(pool, database, table).await?;
    check_identifier_column(&table_schema, satellite_tables, identifier_column)?;
    info!(table = %table, columns = table_schema.column_count(), "reloaded table schema");
    schemas.add_table_schema(table_schema).await;
    *schema_refreshed = true;

    Ok(())
}

fn read_event_data(event: &Event) -> EtlResult<Option<EventData<'_>>> {
    event.read_data().map_err(|err| {
        etl_error!(
            ErrorKind::ProtocolViolation,
            "Malformed binlog event",
            err
        )
    })
}

fn table_map<'a>(
    stream: &'a BinlogStream,
    rows_data: &RowsEventData<'_>,
) -> Option<&'a TableMapEvent<'static>> {
    stream.get_tme(rows_data.table_id())
}

/// Returns the tracked table targeted by a rows event.
///
/// A stream resumed in the middle of a statement first sees the remaining rows events of
/// that statement, whose table map preceded the resume position. Those rows were already
/// delivered by the previous run and are skipped until the first table map arrives.
fn rows_target(
    stream: &BinlogStream,
    rows_data: &RowsEventData<'_>,
    database: &str,
    tables: &BTreeSet<String>,
    table_map_seen: bool,
) -> EtlResult<RowsTarget> {
    let Some(tme) = table_map(stream, rows_data) else {
        return missing_table_map(rows_data.table_id(), table_map_seen);
    };

    let table = tme.table_name();
    if tme.database_name() != database || !tables.contains(&*table) {
        return Ok(RowsTarget::Ignored);
    }

    Ok(RowsTarget::Tracked {
        table: table.into_owned(),
        column_count: tme.columns_count() as usize,
    })
}

/// Handles a rows event whose table map is unknown to the stream.
fn missing_table_map(table_id: u64, table_map_seen: bool) -> EtlResult<RowsTarget> {
    if table_map_seen {
        bail!(
            ErrorKind::ProtocolViolation,
            "Rows event without table map",
            format!("No table map event was received for table id {table_id}")
        );
    }

    warn!(
        table_id,
        "skipping rows event received before any table map since the stream was opened"
    );

    Ok(RowsTarget::Ignored)
}

fn decode_event(data: EventData<'_>) -> Step {
    match data {
        EventData::RotateEvent(rotate) => Step::Event(BinlogEvent::Rotation(BinlogPosition::new(
            rotate.name().into_owned(),
            rotate.position(),
        ))),
        EventData::XidEvent(xid) => Step::Event(BinlogEvent::TransactionCommit { xid: xid.xid }),
        _ => Step::Skipped,
    }
}

fn decode_rows(
    stream: &BinlogStream,
    rows_data: &RowsEventData<'_>,
    table_schema: &TableSchema,
) -> EtlResult<RowsEvent> {
    let kind = match rows_data {
        RowsEventData::WriteRowsEvent(_) | RowsEventData::WriteRowsEventV1(_) => RowKind::Insert,
        RowsEventData::UpdateRowsEvent(_) | RowsEventData::UpdateRowsEventV1(_) => {
            RowKind::Update
        }
        RowsEventData::DeleteRowsEvent(_) | RowsEventData::DeleteRowsEventV1(_) => {
            RowKind::Delete
        }
        _ => {
            bail!(
                ErrorKind::ProtocolViolation,
                "Unsupported rows event",
                format!(
                    "Rows event variant for table '{}' cannot be mapped to full row images",
                    table_schema.name
                )
            );
        }
    };

    let Some(tme) = table_map(stream, rows_data) else {
        bail!(
            ErrorKind::ProtocolViolation,
            "Rows event without table map",
            format!("No table map event was received for table '{}'", table_schema.name)
        );
    };

    let mut rows = Vec::new();
    for row in rows_data.rows(tme) {
        let (before, after) = row.map_err(|err| {
            etl_error!(
                ErrorKind::ProtocolViolation,
                "Malformed binlog row",
                err
            )
        })?;

        let row = match (kind, before, after) {
            (RowKind::Insert, None, Some(after)) => RawRow::Values(row_values(after, table_schema)?),
            (RowKind::Delete, Some(before), None) => {
                RawRow::Values(row_values(before, table_schema)?)
            }
            (RowKind::Update, Some(before), Some(after)) => RawRow::Changed {
                before: row_values(before, table_schema)?,
                after: row_values(after, table_schema)?,
            },
            (kind, before, after) => {
                bail!(
                    ErrorKind::ProtocolViolation,
                    "Unknown row shape in binlog",
                    format!(
                        "A {kind} event on table '{}' carried a before image: {}, an after image: {}",
                        table_schema.name,
                        before.is_some(),
                        after.is_some()
                    )
                );
            }
        };
        rows.push(row);
    }

    Ok(RowsEvent {
        kind,
        table: table_schema.name.clone(),
        rows,
    })
}

fn row_values(row: BinlogRow, table_schema: &TableSchema) -> EtlResult<RowValues> {
    let values = row.unwrap();
    if values.len() != table_schema.column_count() {
        bail!(
            ErrorKind::SourceSchemaError,
            "Binlog row does not match the table schema",
            format!(
                "Row of table '{}' has {} values but the table has {} columns, binlog_row_image must be FULL",
                table_schema.name,
                values.len(),
                table_schema.column_count()
            )
        );
    }

    let mut row_values = RowValues::with_capacity(values.len());
    for (column, value) in table_schema.columns.iter().zip(values) {
        row_values.insert(column.name.clone(), binlog_value_to_cell(value, &column.data_type)?);
    }

    Ok(row_values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::shared::PipelineConfig;

    use crate::schema::ColumnSchema;
    use crate::types::Checkpoint;

    fn pipeline_config() -> PipelineConfig {
        PipelineConfig {
            tables: vec!["orders".to_string(), "order_items".to_string()],
            identifier_column: "order_id".to_string(),
            server_id: 1001,
        }
    }

    fn table_schema(name: &str, columns: &[&str]) -> TableSchema {
        TableSchema::new(
            name,
            columns
                .iter()
                .map(|column| ColumnSchema::new(*column, "int"))
                .collect(),
        )
    }

    #[test]
    fn test_start_position_without_checkpoint_reads_oldest_binlog() {
        let request = StreamRequest::new(None, &pipeline_config());

        assert_eq!(start_position(&request), (String::new(), BINLOG_HEADER_SIZE));
    }

    #[test]
    fn test_start_position_resumes_from_checkpoint() {
        let checkpoint = Checkpoint::new("mysql-bin.000012", 8_192);
        let request = StreamRequest::new(Some(checkpoint), &pipeline_config());

        assert_eq!(
            start_position(&request),
            ("mysql-bin.000012".to_string(), 8_192)
        );
    }

    #[test]
    fn test_rotation_switches_file() {
        let rotation = BinlogPosition::new("mysql-bin.000013", 4);

        let position = next_position(
            Some("mysql-bin.000012".to_string()),
            9_000,
            0,
            Some(&rotation),
        );

        assert_eq!(position, (Some("mysql-bin.000013".to_string()), 4));
    }

    #[test]
    fn test_rotation_sets_file_when_streaming_from_oldest_binlog() {
        let rotation = BinlogPosition::new("mysql-bin.000001", 4);

        let position = next_position(None, BINLOG_HEADER_SIZE, 0, Some(&rotation));

        assert_eq!(position, (Some("mysql-bin.000001".to_string()), 4));
    }

    #[test]
    fn test_zero_header_offset_keeps_position() {
        // Format description and other artificial events report a zero offset.
        let position = next_position(Some("mysql-bin.000012".to_string()), 1_024, 0, None);

        assert_eq!(position, (Some("mysql-bin.000012".to_string()), 1_024));
    }

    #[test]
    fn test_header_offset_advances_position() {
        let position = next_position(Some("mysql-bin.000012".to_string()), 1_024, 1_311, None);

        assert_eq!(position, (Some("mysql-bin.000012".to_string()), 1_311));
    }

    #[test]
    fn test_satellite_without_identifier_column_is_rejected() {
        let request = StreamRequest::new(None, &pipeline_config());
        let schema = table_schema("order_items", &["id", "sku"]);

        let err = check_identifier_column(
            &schema,
            &request.satellite_tables,
            &request.identifier_column,
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SourceSchemaError);
    }

    #[test]
    fn test_identifier_column_is_only_required_in_satellites() {
        let request = StreamRequest::new(None, &pipeline_config());

        let master = table_schema("orders", &["id", "status"]);
        assert!(
            check_identifier_column(&master, &request.satellite_tables, &request.identifier_column)
                .is_ok()
        );

        let satellite = table_schema("order_items", &["order_id", "sku"]);
        assert!(
            check_identifier_column(
                &satellite,
                &request.satellite_tables,
                &request.identifier_column
            )
            .is_ok()
        );
    }

    #[test]
    fn test_rows_without_table_map_are_skipped_after_resume() {
        let target = missing_table_map(42, false).unwrap();

        assert!(matches!(target, RowsTarget::Ignored));
    }

    #[test]
    fn test_rows_without_table_map_fail_once_a_table_map_was_seen() {
        let err = missing_table_map(42, true).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
    }
}
