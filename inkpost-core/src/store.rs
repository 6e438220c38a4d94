//! Identifier store — SQLite mapping from document path to remote post.
//!
//! # Schema
//!
//! ```text
//! posts(
//!   filepath TEXT PRIMARY KEY,      -- repository-relative path
//!   postid   TEXT NOT NULL UNIQUE,  -- remote post id
//!   title    TEXT NOT NULL,
//!   mdate    TEXT,
//!   tags     TEXT,                  -- JSON list
//!   weight   INTEGER DEFAULT 5
//! )
//! ```
//!
//! Both `filepath` and `postid` are unique. Replacing a row (by path or by id)
//! is a delete + insert inside one transaction, so a failed insert never loses
//! the old row.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{store_io, StoreError};
use crate::types::{MappingRecord, PostId, RelPath, DEFAULT_WEIGHT};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS posts (
    filepath TEXT NOT NULL PRIMARY KEY,
    postid   TEXT NOT NULL UNIQUE,
    title    TEXT NOT NULL,
    mdate    TEXT,
    tags     TEXT,
    weight   INTEGER DEFAULT 5
);
"#;

const SELECT_COLUMNS: &str = "SELECT filepath, postid, title, mdate, tags, weight FROM posts";

/// Durable path ↔ post id mapping.
#[derive(Debug)]
pub struct IdentifierStore {
    path: Option<PathBuf>,
    conn: Connection,
}

impl IdentifierStore {
    /// Open (or create) the store at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(|e| store_io(dir, e))?;
            }
        }
        let conn = Connection::open(&path)?;
        let store = Self {
            path: Some(path),
            conn,
        };
        store.migrate()?;
        Ok(store)
    }

    /// A throwaway store, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            path: None,
            conn: Connection::open_in_memory()?,
        };
        store.migrate()?;
        Ok(store)
    }

    /// File backing the store, `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Insert a new record. Fails if its path or id is already mapped.
    pub fn insert(&mut self, record: &MappingRecord) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        insert_row(&tx, record)?;
        tx.commit()?;
        tracing::debug!("mapped {} -> {}", record.path, record.remote_id);
        Ok(())
    }

    /// Replace the row keyed by `record.path`.
    pub fn update_by_path(&mut self, record: &MappingRecord) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM posts WHERE filepath = ?1",
            [record.path.as_str()],
        )?;
        insert_row(&tx, record)?;
        tx.commit()?;
        tracing::debug!("updated mapping for {}", record.path);
        Ok(())
    }

    /// Replace the row keyed by `record.remote_id`; the path may change.
    ///
    /// The new path must not already belong to a different id.
    pub fn update_by_identifier(&mut self, record: &MappingRecord) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM posts WHERE postid = ?1",
            [record.remote_id.as_str()],
        )?;
        insert_row(&tx, record)?;
        tx.commit()?;
        tracing::debug!("updated mapping for post {}", record.remote_id);
        Ok(())
    }

    pub fn lookup_id(&self, path: &RelPath) -> Result<Option<PostId>, StoreError> {
        let id = self
            .conn
            .query_row(
                "SELECT postid FROM posts WHERE filepath = ?1",
                [path.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(id.map(PostId))
    }

    /// Fallback lookup for content whose path is no longer tracked.
    ///
    /// Returns [`StoreError::AmbiguousTitle`] if several posts share `title`.
    pub fn lookup_id_by_title(&self, title: &str) -> Result<Option<PostId>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT postid FROM posts WHERE title = ?1")?;
        let ids = stmt
            .query_map([title], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        match ids.len() {
            0 => Ok(None),
            1 => Ok(ids.into_iter().next().map(PostId)),
            count => Err(StoreError::AmbiguousTitle {
                title: title.to_string(),
                count,
            }),
        }
    }

    /// Move a mapping from `old` to `new`, keeping its id and metadata.
    pub fn rename(&mut self, old: &RelPath, new: &RelPath) -> Result<(), StoreError> {
        if old == new {
            return Ok(());
        }
        let tx = self.conn.transaction()?;
        if path_exists(&tx, new)? {
            return Err(StoreError::DuplicateIdentifier {
                key: "filepath",
                value: new.0.clone(),
            });
        }
        let changed = tx.execute(
            "UPDATE posts SET filepath = ?1 WHERE filepath = ?2",
            [new.as_str(), old.as_str()],
        )?;
        if changed == 0 {
            return Err(StoreError::UnknownPath { path: old.clone() });
        }
        tx.commit()?;
        tracing::debug!("renamed mapping {old} -> {new}");
        Ok(())
    }

    /// Delete the row for `path`. Returns whether a row existed.
    pub fn remove(&mut self, path: &RelPath) -> Result<bool, StoreError> {
        let changed = self
            .conn
            .execute("DELETE FROM posts WHERE filepath = ?1", [path.as_str()])?;
        Ok(changed > 0)
    }

    pub fn get(&self, path: &RelPath) -> Result<Option<MappingRecord>, StoreError> {
        let sql = format!("{SELECT_COLUMNS} WHERE filepath = ?1");
        let raw = self
            .conn
            .query_row(&sql, [path.as_str()], RawRow::from_row)
            .optional()?;
        raw.map(RawRow::into_record).transpose()
    }

    pub fn title_for_id(&self, id: &PostId) -> Result<Option<String>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT title FROM posts WHERE postid = ?1",
                [id.as_str()],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn path_for_id(&self, id: &PostId) -> Result<Option<RelPath>, StoreError> {
        let path = self
            .conn
            .query_row(
                "SELECT filepath FROM posts WHERE postid = ?1",
                [id.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(path.map(RelPath))
    }

    /// All records, ordered by path.
    pub fn list(&self) -> Result<Vec<MappingRecord>, StoreError> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY filepath");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], RawRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RawRow::into_record).collect()
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

struct RawRow {
    path: String,
    id: String,
    title: String,
    date: Option<String>,
    tags: Option<String>,
    weight: Option<i64>,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            path: row.get(0)?,
            id: row.get(1)?,
            title: row.get(2)?,
            date: row.get(3)?,
            tags: row.get(4)?,
            weight: row.get(5)?,
        })
    }

    fn into_record(self) -> Result<MappingRecord, StoreError> {
        let tags = match self.tags.as_deref() {
            None | Some("") => Vec::new(),
            Some(json) => serde_json::from_str(json)?,
        };
        Ok(MappingRecord {
            path: RelPath(self.path),
            remote_id: PostId(self.id),
            title: self.title,
            date: self.date,
            tags,
            weight: self.weight.unwrap_or(DEFAULT_WEIGHT),
        })
    }
}

fn path_exists(conn: &Connection, path: &RelPath) -> Result<bool, StoreError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM posts WHERE filepath = ?1",
            [path.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn id_exists(conn: &Connection, id: &PostId) -> Result<bool, StoreError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM posts WHERE postid = ?1",
            [id.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn insert_row(conn: &Connection, record: &MappingRecord) -> Result<(), StoreError> {
    if path_exists(conn, &record.path)? {
        return Err(StoreError::DuplicateIdentifier {
            key: "filepath",
            value: record.path.0.clone(),
        });
    }
    if id_exists(conn, &record.remote_id)? {
        return Err(StoreError::DuplicateIdentifier {
            key: "postid",
            value: record.remote_id.0.clone(),
        });
    }
    let tags = serde_json::to_string(&record.tags)?;
    conn.execute(
        "INSERT INTO posts (filepath, postid, title, mdate, tags, weight) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.path.as_str(),
            record.remote_id.as_str(),
            record.title,
            record.date,
            tags,
            record.weight
        ],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
