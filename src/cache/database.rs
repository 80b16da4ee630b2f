//! SQLite-backed analysis result store.
//!
//! One table, `analysis_cache`, keyed by `(cache_key, result_kind)`. The
//! connection runs in WAL mode so a crash mid-write leaves either the old or
//! the new row, never a torn one. Timestamps are stored as Unix milliseconds.
//!
//! The store does not serialize its callers; [`CacheService`] owns the only
//! handle and funnels every call through a single gate.
//!
//! [`CacheService`]: super::CacheService

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::fs;
use std::path::{Path, PathBuf};

use super::entry::{CacheEntry, EntryInfo, ResultKind};
use super::error::{CacheError, CacheResult};
use super::key::CacheKey;
use super::stats::CacheStatistics;
use crate::cancel::CancelFlag;

/// Schema version stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS analysis_cache (
        cache_key        TEXT    NOT NULL,
        file_digest      TEXT    NOT NULL,
        result_kind      TEXT    NOT NULL,
        payload          BLOB    NOT NULL,
        payload_size     INTEGER NOT NULL,
        created_at       INTEGER NOT NULL,
        last_accessed_at INTEGER NOT NULL,
        PRIMARY KEY (cache_key, result_kind)
    );
    CREATE INDEX IF NOT EXISTS idx_analysis_cache_file_digest
        ON analysis_cache(file_digest);
    CREATE INDEX IF NOT EXISTS idx_analysis_cache_last_accessed
        ON analysis_cache(last_accessed_at);
";

/// Persistent table of compressed analysis results.
pub struct AnalysisStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl AnalysisStore {
    /// Opens or creates the store at `path`, creating parent directories.
    ///
    /// Fails with [`CacheError::StoreUnavailable`] if the file cannot be
    /// opened or is not an SQLite database.
    pub fn open(path: &Path) -> CacheResult<Self> {
        let unavailable = |reason: String| CacheError::StoreUnavailable {
            path: path.to_path_buf(),
            reason,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| unavailable(format!("cannot create directory: {e}")))?;
        }

        let mut conn = Connection::open(path).map_err(|e| unavailable(e.to_string()))?;
        configure_connection(&conn).map_err(|e| unavailable(e.to_string()))?;
        migrate(&mut conn, path)?;

        log::debug!("Opened analysis cache at {}", path.display());
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Opens a private in-memory store.
    pub fn open_in_memory() -> CacheResult<Self> {
        let mut conn = Connection::open_in_memory()?;
        configure_connection(&conn)?;
        migrate(&mut conn, Path::new(":memory:"))?;
        Ok(Self { conn, path: None })
    }

    /// Backing file, `None` for in-memory stores.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether an entry exists; a hit refreshes its last-access time.
    pub fn exists(&self, key: &CacheKey, kind: ResultKind, now: DateTime<Utc>) -> CacheResult<bool> {
        let touched = self.conn.execute(
            "UPDATE analysis_cache
                SET last_accessed_at = MAX(last_accessed_at, ?3)
              WHERE cache_key = ?1 AND result_kind = ?2",
            params![key.as_str(), kind.as_str(), now.timestamp_millis()],
        )?;
        Ok(touched > 0)
    }

    /// Inserts `entry` or replaces the row with the same identity.
    ///
    /// The write is rolled back and [`CacheError::Cancelled`] returned if
    /// `cancel` is set before the transaction commits.
    pub fn upsert(&mut self, entry: &CacheEntry, cancel: &CancelFlag) -> CacheResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO analysis_cache
                 (cache_key, file_digest, result_kind, payload, payload_size,
                  created_at, last_accessed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(cache_key, result_kind) DO UPDATE SET
                 file_digest      = excluded.file_digest,
                 payload          = excluded.payload,
                 payload_size     = excluded.payload_size,
                 created_at       = excluded.created_at,
                 last_accessed_at = excluded.last_accessed_at",
            params![
                entry.cache_key.as_str(),
                entry.file_digest,
                entry.result_kind.as_str(),
                entry.payload,
                entry.payload_size() as i64,
                entry.created_at.timestamp_millis(),
                entry.last_accessed_at.timestamp_millis(),
            ],
        )?;

        if cancel.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        tx.commit()?;
        Ok(())
    }

    /// Returns the compressed payload, refreshing its last-access time.
    pub fn get(
        &mut self,
        key: &CacheKey,
        kind: ResultKind,
        now: DateTime<Utc>,
    ) -> CacheResult<Option<Vec<u8>>> {
        let tx = self.conn.transaction()?;
        let payload: Option<Vec<u8>> = tx
            .query_row(
                "SELECT payload FROM analysis_cache WHERE cache_key = ?1 AND result_kind = ?2",
                params![key.as_str(), kind.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        if payload.is_some() {
            tx.execute(
                "UPDATE analysis_cache
                    SET last_accessed_at = MAX(last_accessed_at, ?3)
                  WHERE cache_key = ?1 AND result_kind = ?2",
                params![key.as_str(), kind.as_str(), now.timestamp_millis()],
            )?;
        }
        tx.commit()?;
        Ok(payload)
    }

    /// Entry metadata without touching its access time.
    pub fn entry(&self, key: &CacheKey, kind: ResultKind) -> CacheResult<Option<EntryInfo>> {
        let info = self
            .conn
            .query_row(
                "SELECT payload_size, created_at, last_accessed_at, file_digest
                   FROM analysis_cache
                  WHERE cache_key = ?1 AND result_kind = ?2",
                params![key.as_str(), kind.as_str()],
                |row| {
                    Ok(EntryInfo {
                        cache_key: key.clone(),
                        result_kind: kind,
                        payload_size: row.get::<_, i64>(0)? as u64,
                        created_at: from_millis(row.get(1)?),
                        last_accessed_at: from_millis(row.get(2)?),
                        file_digest: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(info)
    }

    /// Removes every row whose last access is at or before `cutoff`.
    ///
    /// Each kind is swept in its own savepoint; a kind that fails is logged
    /// and skipped while the others proceed. In that case the rows that were
    /// removed are still committed and [`CacheError::EvictionFailure`]
    /// carries their count. Cancellation rolls back the whole sweep.
    pub fn delete_older_than(
        &mut self,
        cutoff: DateTime<Utc>,
        cancel: &CancelFlag,
    ) -> CacheResult<usize> {
        let cutoff_ms = cutoff.timestamp_millis();
        let mut removed = 0;
        let mut failures = Vec::new();

        let mut tx = self.conn.transaction()?;
        for kind in ResultKind::ALL {
            let sp = tx.savepoint()?;
            match sp.execute(
                "DELETE FROM analysis_cache WHERE result_kind = ?1 AND last_accessed_at <= ?2",
                params![kind.as_str(), cutoff_ms],
            ) {
                Ok(n) => {
                    sp.commit()?;
                    removed += n;
                }
                Err(e) => {
                    log::warn!("Eviction of {} entries failed: {}", kind, e);
                    failures.push(format!("{kind}: {e}"));
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        tx.commit()?;

        if failures.is_empty() {
            Ok(removed)
        } else {
            Err(CacheError::EvictionFailure {
                removed,
                reason: failures.join("; "),
            })
        }
    }

    /// Removes all rows of one source file, across kinds and versions.
    pub fn delete_by_file_digest(&mut self, digest: &str, cancel: &CancelFlag) -> CacheResult<usize> {
        self.delete_where("DELETE FROM analysis_cache WHERE file_digest = ?1", &[&digest], cancel)
    }

    /// Removes every row.
    pub fn clear(&mut self, cancel: &CancelFlag) -> CacheResult<usize> {
        self.delete_where("DELETE FROM analysis_cache", &[], cancel)
    }

    fn delete_where(
        &mut self,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
        cancel: &CancelFlag,
    ) -> CacheResult<usize> {
        let tx = self.conn.transaction()?;
        let removed = tx.execute(sql, args)?;
        if cancel.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        tx.commit()?;
        Ok(removed)
    }

    /// Reclaims free pages and truncates the WAL.
    pub fn compact(&self) -> CacheResult<()> {
        self.conn
            .execute_batch("VACUUM; PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    }

    /// Bytes used on disk, including WAL and shared-memory side files.
    pub fn size_on_disk_bytes(&self) -> CacheResult<u64> {
        let Some(path) = &self.path else {
            let page_count: u64 = self
                .conn
                .pragma_query_value(None, "page_count", |row| row.get(0))?;
            let page_size: u64 = self
                .conn
                .pragma_query_value(None, "page_size", |row| row.get(0))?;
            return Ok(page_count * page_size);
        };

        let total = ["", "-wal", "-shm"]
            .iter()
            .map(|suffix| {
                let mut file = path.as_os_str().to_owned();
                file.push(suffix);
                fs::metadata(PathBuf::from(file)).map_or(0, |m| m.len())
            })
            .sum();
        Ok(total)
    }

    /// Counts and sizes per kind, plus the store's footprint.
    pub fn statistics(&self) -> CacheResult<CacheStatistics> {
        let mut stats = CacheStatistics {
            enabled: true,
            available: true,
            store_size_on_disk_bytes: self.size_on_disk_bytes()?,
            ..CacheStatistics::default()
        };

        let mut stmt = self.conn.prepare(
            "SELECT result_kind, COUNT(*), COALESCE(SUM(payload_size), 0),
                    MIN(last_accessed_at), MAX(last_accessed_at)
               FROM analysis_cache
           GROUP BY result_kind",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, Option<i64>>(3)?,
                row.get::<_, Option<i64>>(4)?,
            ))
        })?;

        let mut oldest: Option<i64> = None;
        let mut newest: Option<i64> = None;
        for row in rows {
            let (tag, count, bytes, min_access, max_access) = row?;
            let count = count as u64;
            match tag.parse::<ResultKind>() {
                Ok(ResultKind::Threats) => stats.threat_entries += count,
                Ok(ResultKind::VoiceQos) => stats.voice_qos_entries += count,
                Err(e) => log::debug!("Ignoring rows with {}", e),
            }
            stats.total_entries += count;
            stats.total_payload_bytes += bytes as u64;
            if let Some(t) = min_access {
                oldest = Some(oldest.map_or(t, |o| o.min(t)));
            }
            newest = newest.max(max_access);
        }

        stats.oldest_access = oldest.map(from_millis);
        stats.newest_access = newest.map(from_millis);
        Ok(stats)
    }

    /// Closes the connection, reporting any error SQLite raises on close.
    pub fn close(self) -> CacheResult<()> {
        self.conn.close().map_err(|(_, e)| CacheError::Sqlite(e))
    }
}

/// WAL for crash safety, a busy timeout for other processes holding the
/// file lock.
fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        PRAGMA busy_timeout = 5000;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA temp_store = MEMORY;
        ",
    )
}

/// Brings the schema to [`SCHEMA_VERSION`].
///
/// Runs under an immediate transaction so two processes bootstrapping the
/// same file do not interleave. Rows from an older schema are dropped, since
/// every row can be recomputed.
fn migrate(conn: &mut Connection, path: &Path) -> CacheResult<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let version: i64 = tx.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version > SCHEMA_VERSION {
        return Err(CacheError::StoreUnavailable {
            path: path.to_path_buf(),
            reason: format!(
                "schema version {version} is newer than supported version {SCHEMA_VERSION}"
            ),
        });
    }
    if version != 0 && version < SCHEMA_VERSION {
        log::info!(
            "Discarding analysis cache with old schema version {} (current {})",
            version,
            SCHEMA_VERSION
        );
        tx.execute_batch("DROP TABLE IF EXISTS analysis_cache;")?;
    }

    tx.execute_batch(SCHEMA)?;
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;
    Ok(())
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}
