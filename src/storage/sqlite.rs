//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::{Direction, HaltReason, RecordStatus, GATEWAY_ERROR_MARKERS};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    BatchWrite, CategoryPath, CrawlRecord, DeadMarker, ErrorRecord, RecordPage, RecordQuery,
    RunRecord, RunStatus, CATEGORY_SEPARATOR, GATEWAY_ERROR_TITLE,
};
use crate::SweepError;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const RECORD_COLUMNS: &str = "id, title, category, size, seeders, magnet, status, scraped_at";

const RUN_COLUMNS: &str =
    "id, started_at, finished_at, config_hash, range_start, range_end, status, live_count";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
    /// Database file and its write-ahead log; None in memory
    files: Option<(PathBuf, PathBuf)>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(SweepError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, SweepError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        initialize_schema(&conn)?;

        let mut wal = path.as_os_str().to_owned();
        wal.push("-wal");

        Ok(Self {
            conn,
            files: Some((path.to_path_buf(), PathBuf::from(wal))),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, SweepError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn,
            files: None,
        })
    }
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(
        &mut self,
        config_hash: &str,
        range_start: i64,
        range_end: i64,
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, range_start, range_end, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                now,
                config_hash,
                range_start,
                range_end,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        reason: HaltReason,
        live_count: u64,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, live_count = ?3 WHERE id = ?4",
            params![
                RunStatus::Halted(reason).to_db_string(),
                now,
                live_count as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                row_to_run,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                row_to_run,
            )
            .optional()?;
        Ok(run)
    }

    // ===== Records and Tombstones =====

    fn upsert_record(&mut self, record: &CrawlRecord) -> StorageResult<()> {
        upsert_record_on(&self.conn, record)?;
        Ok(())
    }

    fn insert_dead_if_absent(&mut self, id: i64) -> StorageResult<bool> {
        Ok(insert_dead_on(&self.conn, id)?)
    }

    fn record_error(&mut self, id: i64, message: &str) -> StorageResult<()> {
        record_error_on(&self.conn, id, message)?;
        Ok(())
    }

    fn write_batch(&mut self, writes: &[BatchWrite]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;

        for write in writes {
            match write {
                BatchWrite::Record(record) => upsert_record_on(&tx, record)?,
                BatchWrite::Dead(id) => {
                    insert_dead_on(&tx, *id)?;
                }
                BatchWrite::Error { id, message } => record_error_on(&tx, *id, message)?,
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn get_record(&self, id: i64) -> StorageResult<Option<CrawlRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {} FROM records WHERE id = ?1", RECORD_COLUMNS),
                params![id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn get_dead(&self, id: i64) -> StorageResult<Option<DeadMarker>> {
        let marker = self
            .conn
            .query_row(
                "SELECT id, discovered_at FROM dead_ids WHERE id = ?1",
                params![id],
                |row| {
                    let discovered_at: String = row.get(1)?;
                    Ok(DeadMarker {
                        id: row.get(0)?,
                        discovered_at: parse_timestamp(1, &discovered_at)?,
                    })
                },
            )
            .optional()?;
        Ok(marker)
    }

    fn get_error(&self, id: i64) -> StorageResult<Option<ErrorRecord>> {
        let error = self
            .conn
            .query_row(
                "SELECT id, attempts, last_error, last_attempt_at FROM error_ids WHERE id = ?1",
                params![id],
                |row| {
                    let last_attempt_at: String = row.get(3)?;
                    Ok(ErrorRecord {
                        id: row.get(0)?,
                        attempts: row.get(1)?,
                        last_error: row.get(2)?,
                        last_attempt_at: parse_timestamp(3, &last_attempt_at)?,
                    })
                },
            )
            .optional()?;
        Ok(error)
    }

    fn get_error_ids(&self, direction: Direction) -> StorageResult<Vec<i64>> {
        let order = match direction {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        };
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT id FROM error_ids ORDER BY id {}", order))?;

        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;

        Ok(ids)
    }

    // ===== Resume and Housekeeping =====

    fn resume_point(&self, direction: Direction) -> StorageResult<Option<i64>> {
        let aggregate = match direction {
            Direction::Ascending => "MAX",
            Direction::Descending => "MIN",
        };

        let point: Option<i64> = self.conn.query_row(
            &format!(
                "SELECT {}(id) FROM (SELECT id FROM records UNION ALL SELECT id FROM dead_ids)",
                aggregate
            ),
            [],
            |row| row.get(0),
        )?;

        Ok(point)
    }

    fn size_on_disk(&self) -> StorageResult<u64> {
        // Pages not yet checkpointed live only in the WAL file
        if let Some((db, wal)) = &self.files {
            return Ok(file_len(db) + file_len(wal));
        }

        let page_count: i64 = self
            .conn
            .query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: i64 = self
            .conn
            .query_row("PRAGMA page_size", [], |row| row.get(0))?;

        Ok((page_count.max(0) as u64) * (page_size.max(0) as u64))
    }

    fn clear_all(&mut self) -> StorageResult<()> {
        self.conn.execute_batch(
            "
            DELETE FROM records;
            DELETE FROM dead_ids;
            DELETE FROM error_ids;
            DELETE FROM runs;
            VACUUM;
        ",
        )?;
        Ok(())
    }

    // ===== Read Side =====

    fn list_records(&self, query: &RecordQuery) -> StorageResult<RecordPage> {
        let (where_sql, values) = listing_filter(query);

        let total_count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM records {}", where_sql),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;
        let total_count = total_count.max(0) as u64;

        let per_page = query.per_page.max(1);
        let total_pages = (total_count.div_ceil(per_page as u64)).max(1) as u32;
        let page = query.page.clamp(1, total_pages);
        let offset = (page as u64 - 1) * per_page as u64;

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM records {} ORDER BY id ASC LIMIT {} OFFSET {}",
            RECORD_COLUMNS, where_sql, per_page, offset
        ))?;

        let records = stmt
            .query_map(params_from_iter(values.iter()), row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RecordPage {
            records,
            total_count,
            page,
            total_pages,
        })
    }

    fn category_tree(&self) -> StorageResult<BTreeMap<String, Vec<CategoryPath>>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT category FROM records WHERE category != '' ORDER BY category")?;

        let mut tree: BTreeMap<String, Vec<CategoryPath>> = BTreeMap::new();
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        for row in rows {
            let path = CategoryPath::parse(&row?);
            if let Some(root) = path.root().map(str::to_string) {
                tree.entry(root).or_default().push(path);
            }
        }

        Ok(tree)
    }

    // ===== Statistics =====

    fn count_records_by_status(&self, status: RecordStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_dead(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM dead_ids", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_errors(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM error_ids", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

// A classified id is no longer a transport failure, so both writers clear
// the matching error row.
fn upsert_record_on(conn: &Connection, record: &CrawlRecord) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO records ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            RECORD_COLUMNS
        ),
        params![
            record.id,
            record.title,
            record.category.to_db_string(),
            record.size,
            record.seeders,
            record.magnet,
            record.status.to_db_string(),
            record.recorded_at.to_rfc3339()
        ],
    )?;
    conn.execute("DELETE FROM error_ids WHERE id = ?1", params![record.id])?;
    Ok(())
}

fn insert_dead_on(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let now = Utc::now().to_rfc3339();
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO dead_ids (id, discovered_at) VALUES (?1, ?2)",
        params![id, now],
    )?;
    conn.execute("DELETE FROM error_ids WHERE id = ?1", params![id])?;
    Ok(inserted > 0)
}

fn record_error_on(conn: &Connection, id: i64, message: &str) -> rusqlite::Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO error_ids (id, attempts, last_error, last_attempt_at) VALUES (?1, 1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET
             attempts = attempts + 1,
             last_error = excluded.last_error,
             last_attempt_at = excluded.last_attempt_at",
        params![id, message, now],
    )?;
    Ok(())
}

/// Builds the WHERE clause and bound values for a listing query
fn listing_filter(query: &RecordQuery) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(search));
        clauses.push(
            "(title LIKE ? ESCAPE '\\' OR CAST(id AS TEXT) LIKE ? ESCAPE '\\')".to_string(),
        );
        values.push(pattern.clone());
        values.push(pattern);
    }

    if !query.include_gateway_errors {
        for marker in GATEWAY_ERROR_MARKERS.iter().chain([&GATEWAY_ERROR_TITLE]) {
            clauses.push("title NOT LIKE ? ESCAPE '\\'".to_string());
            values.push(format!("%{}%", escape_like(marker)));
        }
    }

    if let Some(category) = query.category.as_ref().filter(|c| !c.is_empty()) {
        let joined = category.to_db_string();
        clauses.push("(category = ? OR category LIKE ? ESCAPE '\\')".to_string());
        values.push(joined.clone());
        values.push(format!(
            "{}{}%",
            escape_like(&joined),
            escape_like(CATEGORY_SEPARATOR)
        ));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    (where_sql, values)
}

/// Length of a file on disk, 0 if it does not exist
fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).map_or(0, |meta| meta.len())
}

/// Escapes LIKE metacharacters so user input matches literally
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn parse_timestamp(index: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<CrawlRecord> {
    let category: String = row.get(2)?;
    let status: String = row.get(6)?;
    let scraped_at: String = row.get(7)?;

    Ok(CrawlRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        category: CategoryPath::parse(&category),
        size: row.get(3)?,
        seeders: row.get(4)?,
        magnet: row.get(5)?,
        status: RecordStatus::from_db_string(&status).unwrap_or(RecordStatus::Unknown),
        recorded_at: parse_timestamp(7, &scraped_at)?,
    })
}

fn row_to_run(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let status: String = row.get(6)?;
    let live_count: i64 = row.get(7)?;

    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        range_start: row.get(4)?,
        range_end: row.get(5)?,
        status: RunStatus::from_db_string(&status).unwrap_or(RunStatus::Running),
        live_count: live_count.max(0) as u64,
    })
}
