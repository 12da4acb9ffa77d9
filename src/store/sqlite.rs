use super::SearchFilter;
use crate::record::{ReadingValue, Record, RecordPayload};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

const SELECT_COLUMNS: &str = "SELECT id, tipo, nombre, valor, unidad, timestamp FROM records";

/// Record store backed by SQLite.
///
/// # Schema
/// ```sql
/// CREATE TABLE records (
///     seq INTEGER PRIMARY KEY AUTOINCREMENT, -- insertion order
///     id TEXT NOT NULL UNIQUE,               -- UUIDv7
///     tipo TEXT,
///     nombre TEXT,
///     valor TEXT,                            -- JSON-encoded value
///     unidad TEXT,
///     timestamp TEXT NOT NULL                -- RFC 3339
/// );
/// ```
///
/// The connection is held in a `Mutex<Option<_>>`; after `disconnect` every
/// operation fails with a store error instead of panicking.
pub struct RecordStore {
    conn: Mutex<Option<Connection>>,
}

impl RecordStore {
    /// Opens (or creates) the store at `url`.
    ///
    /// `url` is a database file path, or `:memory:` for a private in-memory
    /// database.
    pub fn connect(url: &str) -> Result<Self> {
        info!(url = %url, "Connecting to record store");

        let conn = Connection::open(url).context("Failed to open record store")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                tipo TEXT,
                nombre TEXT,
                valor TEXT,
                unidad TEXT,
                timestamp TEXT NOT NULL
            )
            "#,
            [],
        )
        .context("Failed to create records table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_records_tipo ON records(tipo)",
            [],
        )
        .context("Failed to create index")?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Closes the underlying connection. Safe to call more than once.
    pub fn disconnect(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("Record store lock poisoned"))?
            .take();

        if let Some(conn) = conn {
            conn.close()
                .map_err(|(_, e)| e)
                .context("Failed to close record store")?;
            info!("Record store disconnected");
        }

        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.conn.lock().map(|c| c.is_some()).unwrap_or(false)
    }

    /// Persists a new record with a fresh identifier.
    ///
    /// `timestamp` defaults to now when the payload omits it.
    pub fn insert(&self, payload: RecordPayload) -> Result<Record> {
        let record = Record {
            id: Uuid::now_v7().to_string(),
            kind: payload.kind.flatten(),
            name: payload.name.flatten(),
            value: payload.value.flatten(),
            unit: payload.unit.flatten(),
            timestamp: payload.timestamp.unwrap_or_else(Utc::now),
        };

        let valor = encode_value(record.value.as_ref())?;

        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO records (id, tipo, nombre, valor, unidad, timestamp)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    record.id,
                    record.kind,
                    record.name,
                    valor,
                    record.unit,
                    record.timestamp.to_rfc3339(),
                ],
            )
            .context("Failed to insert record")?;
            Ok(())
        })?;

        debug!(record_id = %record.id, "Record inserted");
        Ok(record)
    }

    /// All records in insertion order
    pub fn find_all(&self) -> Result<Vec<Record>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!("{} ORDER BY seq", SELECT_COLUMNS))
                .context("Failed to prepare query")?;

            let rows = stmt
                .query_map([], StoredRow::from_row)
                .context("Failed to execute query")?;

            collect_records(rows)
        })
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<Record>> {
        self.with_conn(|conn| select_by_id(conn, id))
    }

    /// Replaces the fields present in `payload` on an existing record.
    ///
    /// Returns the post-update record, or `None` when no record has that
    /// identifier. Never inserts.
    pub fn update_by_id(&self, id: &str, payload: RecordPayload) -> Result<Option<Record>> {
        self.with_conn(|conn| {
            let tx = conn
                .unchecked_transaction()
                .context("Failed to begin transaction")?;

            let Some(mut record) = select_by_id(&tx, id)? else {
                return Ok(None);
            };
            record.apply(payload);

            tx.execute(
                r#"
                UPDATE records
                SET tipo = ?2, nombre = ?3, valor = ?4, unidad = ?5, timestamp = ?6
                WHERE id = ?1
                "#,
                params![
                    record.id,
                    record.kind,
                    record.name,
                    encode_value(record.value.as_ref())?,
                    record.unit,
                    record.timestamp.to_rfc3339(),
                ],
            )
            .context("Failed to update record")?;

            tx.commit().context("Failed to commit update")?;
            Ok(Some(record))
        })
    }

    /// Removes a record, returning its pre-deletion state.
    pub fn delete_by_id(&self, id: &str) -> Result<Option<Record>> {
        self.with_conn(|conn| {
            let tx = conn
                .unchecked_transaction()
                .context("Failed to begin transaction")?;

            let Some(record) = select_by_id(&tx, id)? else {
                return Ok(None);
            };

            tx.execute("DELETE FROM records WHERE id = ?1", params![id])
                .context("Failed to delete record")?;

            tx.commit().context("Failed to commit delete")?;
            Ok(Some(record))
        })
    }

    /// Records matching every criterion in `filter`, in insertion order.
    ///
    /// Kind is compared exactly (case-sensitive) in SQL. The name criterion
    /// is a case-insensitive substring test applied to the rows SQL returns,
    /// so non-ASCII names fold the same way as ASCII ones.
    pub fn search(&self, filter: &SearchFilter) -> Result<Vec<Record>> {
        let kind = filter.kind.map(|k| k.kind());

        let records = self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "{} WHERE (?1 IS NULL OR tipo = ?1) ORDER BY seq",
                    SELECT_COLUMNS
                ))
                .context("Failed to prepare query")?;

            let rows = stmt
                .query_map(params![kind], StoredRow::from_row)
                .context("Failed to execute query")?;

            collect_records(rows)
        })?;

        Ok(match &filter.name {
            Some(name) => records
                .into_iter()
                .filter(|r| r.name_contains(name))
                .collect(),
            None => records,
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self
            .conn
            .lock()
            .map_err(|_| anyhow!("Record store lock poisoned"))?;
        let conn = guard
            .as_ref()
            .ok_or_else(|| anyhow!("Record store is disconnected"))?;
        f(conn)
    }
}

fn select_by_id(conn: &Connection, id: &str) -> Result<Option<Record>> {
    let row = conn
        .query_row(
            &format!("{} WHERE id = ?1", SELECT_COLUMNS),
            params![id],
            StoredRow::from_row,
        )
        .optional()
        .context("Failed to query record")?;

    row.map(StoredRow::into_record).transpose()
}

fn collect_records(
    rows: impl Iterator<Item = rusqlite::Result<StoredRow>>,
) -> Result<Vec<Record>> {
    rows.map(|row| row.context("Failed to read row")?.into_record())
        .collect()
}

fn encode_value(value: Option<&ReadingValue>) -> Result<Option<String>> {
    value
        .map(serde_json::to_string)
        .transpose()
        .context("Failed to encode record value")
}

/// Raw column values, decoded into a `Record` outside the rusqlite callback
struct StoredRow {
    id: String,
    tipo: Option<String>,
    nombre: Option<String>,
    valor: Option<String>,
    unidad: Option<String>,
    timestamp: String,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            tipo: row.get(1)?,
            nombre: row.get(2)?,
            valor: row.get(3)?,
            unidad: row.get(4)?,
            timestamp: row.get(5)?,
        })
    }

    fn into_record(self) -> Result<Record> {
        let value = self
            .valor
            .map(|v| serde_json::from_str::<ReadingValue>(&v))
            .transpose()
            .with_context(|| format!("Malformed value for record '{}'", self.id))?;

        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .with_context(|| format!("Malformed timestamp for record '{}'", self.id))?;

        Ok(Record {
            id: self.id,
            kind: self.tipo,
            name: self.nombre,
            value,
            unit: self.unidad,
            timestamp,
        })
    }
}
