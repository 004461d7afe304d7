use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::PagePulseError;
use crate::fields::ExtractedFields;

/// Immutable capture of a page's extracted fields.
///
/// Maps to the `snapshots` table. Rows are only ever inserted; the latest
/// snapshot for a URL is the one with the greatest `created_at`.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    snapshot_id: i64,
    url_id: i64,
    content_hash: String,
    fields: ExtractedFields,
    created_at: i64,
}

/// A snapshot that has not been stored yet.
#[derive(Clone, Debug, PartialEq)]
pub struct NewSnapshot {
    pub url_id: i64,
    pub content_hash: String,
    pub fields: ExtractedFields,
    pub created_at: i64,
}

impl Snapshot {
    pub fn new(snapshot_id: i64, snapshot: NewSnapshot) -> Self {
        Snapshot {
            snapshot_id,
            url_id: snapshot.url_id,
            content_hash: snapshot.content_hash,
            fields: snapshot.fields,
            created_at: snapshot.created_at,
        }
    }

    pub fn snapshot_id(&self) -> i64 {
        self.snapshot_id
    }

    pub fn url_id(&self) -> i64 {
        self.url_id
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn fields(&self) -> &ExtractedFields {
        &self.fields
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn get_latest(conn: &Connection, url_id: i64) -> Result<Option<Self>, PagePulseError> {
        let row = conn
            .query_row(
                "SELECT snapshot_id, url_id, content_hash, fields, created_at
                 FROM snapshots
                 WHERE url_id = ?
                 ORDER BY created_at DESC, snapshot_id DESC
                 LIMIT 1",
                params![url_id],
                Self::raw_from_row,
            )
            .optional()?;

        row.map(Self::from_raw).transpose()
    }

    pub fn insert(conn: &Connection, snapshot: NewSnapshot) -> Result<Self, PagePulseError> {
        let fields_json = snapshot.fields.to_json().to_string();

        conn.execute(
            "INSERT INTO snapshots (url_id, content_hash, fields, created_at) VALUES (?, ?, ?, ?)",
            params![snapshot.url_id, snapshot.content_hash, fields_json, snapshot.created_at],
        )?;

        Ok(Snapshot::new(conn.last_insert_rowid(), snapshot))
    }

    fn raw_from_row(row: &Row) -> rusqlite::Result<(i64, i64, String, String, i64)> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
    }

    fn from_raw(raw: (i64, i64, String, String, i64)) -> Result<Self, PagePulseError> {
        let (snapshot_id, url_id, content_hash, fields_json, created_at) = raw;
        Ok(Snapshot {
            snapshot_id,
            url_id,
            content_hash,
            fields: ExtractedFields::from_json_str(&fields_json)?,
            created_at,
        })
    }
}
