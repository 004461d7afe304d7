use crate::alerts::Alerts;
use crate::database::Database;
use crate::error::PagePulseError;
use crate::logs::{LogEntry, NewLog};
use crate::snapshots::{NewSnapshot, Snapshot};
use crate::tracked_urls::TrackedUrl;

pub trait UrlRepository {
    /// The literal URL string of a tracked URL, None if it does not exist.
    fn url_for(&self, url_id: i64) -> Result<Option<String>, PagePulseError>;
    fn touch_last_checked(&self, url_id: i64, at: i64) -> Result<(), PagePulseError>;
}

pub trait SnapshotRepository {
    fn latest_snapshot(&self, url_id: i64) -> Result<Option<Snapshot>, PagePulseError>;

    /// Stores the snapshot and, when given, a log linked to the snapshot's
    /// url. Either everything is written or nothing is.
    fn record_snapshot(
        &self,
        snapshot: NewSnapshot,
        log: Option<NewLog>,
    ) -> Result<(Snapshot, Option<LogEntry>), PagePulseError>;
}

pub trait AlertRepository {
    fn add_hash_collision_alert(
        &self,
        url_id: i64,
        content_hash: &str,
        at: i64,
    ) -> Result<(), PagePulseError>;
}

/// Everything a check needs from persistence.
pub trait MonitorStore: UrlRepository + SnapshotRepository + AlertRepository {}

impl<T> MonitorStore for T where T: UrlRepository + SnapshotRepository + AlertRepository {}

#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        SqliteStore { db }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }
}

impl UrlRepository for SqliteStore {
    fn url_for(&self, url_id: i64) -> Result<Option<String>, PagePulseError> {
        let conn = self.db.conn()?;
        Ok(TrackedUrl::get_by_id(&conn, url_id)?.map(|tracked| tracked.url().to_owned()))
    }

    fn touch_last_checked(&self, url_id: i64, at: i64) -> Result<(), PagePulseError> {
        let conn = self.db.conn()?;
        TrackedUrl::set_last_checked(&conn, url_id, at)
    }
}

impl SnapshotRepository for SqliteStore {
    fn latest_snapshot(&self, url_id: i64) -> Result<Option<Snapshot>, PagePulseError> {
        let conn = self.db.conn()?;
        Snapshot::get_latest(&conn, url_id)
    }

    fn record_snapshot(
        &self,
        snapshot: NewSnapshot,
        log: Option<NewLog>,
    ) -> Result<(Snapshot, Option<LogEntry>), PagePulseError> {
        let conn = self.db.conn()?;

        Database::immediate_transaction(&conn, |conn| {
            let url_id = snapshot.url_id;
            let stored = Snapshot::insert(conn, snapshot)?;
            let entry = match log {
                Some(log) => Some(LogEntry::insert(conn, log, &[url_id])?),
                None => None,
            };
            Ok((stored, entry))
        })
    }
}

impl AlertRepository for SqliteStore {
    fn add_hash_collision_alert(
        &self,
        url_id: i64,
        content_hash: &str,
        at: i64,
    ) -> Result<(), PagePulseError> {
        let conn = self.db.conn()?;
        Alerts::add_hash_collision_alert(&conn, url_id, content_hash, at)
    }
}
