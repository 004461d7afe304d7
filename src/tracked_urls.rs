use rusqlite::{named_params, params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::error::PagePulseError;

#[derive(
    AsRefStr, EnumIter, EnumString, Debug, Display, PartialEq, Eq, Copy, Clone, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    /// Minimum time between two checks.
    pub fn period_seconds(self) -> i64 {
        match self {
            Frequency::Daily => 86_400,
            Frequency::Weekly => 7 * 86_400,
            Frequency::Monthly => 30 * 86_400,
        }
    }
}

/// A monitored address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TrackedUrl {
    url_id: i64,
    project_id: i64,
    url: String,
    monitoring_enabled: bool,
    frequency: Frequency,
    last_checked_at: Option<i64>,
    created_at: i64,
}

impl TrackedUrl {
    const COLUMNS: &str =
        "url_id, project_id, url, monitoring_enabled, frequency, last_checked_at, created_at";

    pub fn url_id(&self) -> i64 {
        self.url_id
    }

    pub fn project_id(&self) -> i64 {
        self.project_id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring_enabled
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn last_checked_at(&self) -> Option<i64> {
        self.last_checked_at
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// Whether a check is due at `now` given the frequency and last check.
    pub fn is_due(&self, now: i64) -> bool {
        if !self.monitoring_enabled {
            return false;
        }
        match self.last_checked_at {
            None => true,
            Some(last) => now - last >= self.frequency.period_seconds(),
        }
    }

    pub fn create(
        conn: &Connection,
        project_id: i64,
        url: &str,
        frequency: Frequency,
        monitoring_enabled: bool,
        now: i64,
    ) -> Result<Self, PagePulseError> {
        let sql = format!(
            "INSERT INTO tracked_urls (project_id, url, monitoring_enabled, frequency, created_at)
             VALUES (:project_id, :url, :enabled, :frequency, :created_at)
             RETURNING {}",
            Self::COLUMNS
        );

        let tracked = conn.query_row(
            &sql,
            named_params! {
                ":project_id": project_id,
                ":url":        url,
                ":enabled":    monitoring_enabled,
                ":frequency":  frequency.as_ref(),
                ":created_at": now,
            },
            Self::from_row,
        )?;

        Ok(tracked)
    }

    pub fn get_by_id(conn: &Connection, url_id: i64) -> Result<Option<Self>, PagePulseError> {
        let sql = format!("SELECT {} FROM tracked_urls WHERE url_id = ?", Self::COLUMNS);
        conn.query_row(&sql, params![url_id], Self::from_row)
            .optional()
            .map_err(PagePulseError::DatabaseError)
    }

    pub fn set_last_checked(conn: &Connection, url_id: i64, at: i64) -> Result<(), PagePulseError> {
        let updated = conn.execute(
            "UPDATE tracked_urls SET last_checked_at = ? WHERE url_id = ?",
            params![at, url_id],
        )?;
        if updated == 0 {
            return Err(PagePulseError::NotFound(format!("url {}", url_id)));
        }
        Ok(())
    }

    pub fn set_monitoring(
        conn: &Connection,
        url_id: i64,
        enabled: bool,
        frequency: Frequency,
    ) -> Result<(), PagePulseError> {
        let updated = conn.execute(
            "UPDATE tracked_urls SET monitoring_enabled = ?, frequency = ? WHERE url_id = ?",
            params![enabled, frequency.as_ref(), url_id],
        )?;
        if updated == 0 {
            return Err(PagePulseError::NotFound(format!("url {}", url_id)));
        }
        Ok(())
    }

    /// Enabled URLs whose last check is older than their frequency allows,
    /// never-checked URLs first.
    pub fn list_due(conn: &Connection, now: i64) -> Result<Vec<Self>, PagePulseError> {
        let sql = format!(
            "SELECT {} FROM tracked_urls
             WHERE monitoring_enabled = 1
             ORDER BY last_checked_at IS NOT NULL, last_checked_at, url_id",
            Self::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::from_row)?;

        let mut due = Vec::new();
        for row in rows {
            let tracked = row?;
            if tracked.is_due(now) {
                due.push(tracked);
            }
        }
        Ok(due)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let frequency: String = row.get(4)?;
        let frequency = frequency.parse::<Frequency>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(TrackedUrl {
            url_id: row.get(0)?,
            project_id: row.get(1)?,
            url: row.get(2)?,
            monitoring_enabled: row.get(3)?,
            frequency,
            last_checked_at: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use tempfile::TempDir;

    const NOW: i64 = 1_700_000_000;
    const DAY: i64 = 86_400;

    fn open() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    #[test]
    fn test_frequency_strings() {
        assert_eq!(Frequency::Daily.as_ref(), "daily");
        assert_eq!("weekly".parse::<Frequency>().unwrap(), Frequency::Weekly);
        assert!("hourly".parse::<Frequency>().is_err());
    }

    #[test]
    fn test_create_and_get() {
        let (_dir, db) = open();
        let conn = db.conn().unwrap();

        let created = TrackedUrl::create(&conn, 3, "https://acme.test/", Frequency::Weekly, true, NOW).unwrap();
        let loaded = TrackedUrl::get_by_id(&conn, created.url_id()).unwrap().unwrap();

        assert_eq!(loaded, created);
        assert_eq!(loaded.project_id(), 3);
        assert_eq!(loaded.frequency(), Frequency::Weekly);
        assert_eq!(loaded.last_checked_at(), None);
        assert!(TrackedUrl::get_by_id(&conn, 999).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_url_in_project_rejected() {
        let (_dir, db) = open();
        let conn = db.conn().unwrap();

        TrackedUrl::create(&conn, 1, "https://acme.test/", Frequency::Daily, true, NOW).unwrap();
        assert!(TrackedUrl::create(&conn, 1, "https://acme.test/", Frequency::Daily, true, NOW).is_err());
        assert!(TrackedUrl::create(&conn, 2, "https://acme.test/", Frequency::Daily, true, NOW).is_ok());
    }

    #[test]
    fn test_set_last_checked_missing_url() {
        let (_dir, db) = open();
        let conn = db.conn().unwrap();
        assert!(matches!(
            TrackedUrl::set_last_checked(&conn, 42, NOW),
            Err(PagePulseError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_due() {
        let (_dir, db) = open();
        let conn = db.conn().unwrap();

        let never = TrackedUrl::create(&conn, 1, "https://a.test/", Frequency::Daily, true, NOW).unwrap();
        let stale = TrackedUrl::create(&conn, 1, "https://b.test/", Frequency::Daily, true, NOW).unwrap();
        let fresh = TrackedUrl::create(&conn, 1, "https://c.test/", Frequency::Weekly, true, NOW).unwrap();
        let disabled = TrackedUrl::create(&conn, 1, "https://d.test/", Frequency::Daily, false, NOW).unwrap();

        TrackedUrl::set_last_checked(&conn, stale.url_id(), NOW - 2 * DAY).unwrap();
        TrackedUrl::set_last_checked(&conn, fresh.url_id(), NOW - 2 * DAY).unwrap();

        let due: Vec<i64> = TrackedUrl::list_due(&conn, NOW)
            .unwrap()
            .iter()
            .map(TrackedUrl::url_id)
            .collect();

        assert_eq!(due, vec![never.url_id(), stale.url_id()]);
        assert!(!due.contains(&disabled.url_id()));

        TrackedUrl::set_monitoring(&conn, fresh.url_id(), true, Frequency::Daily).unwrap();
        assert_eq!(TrackedUrl::list_due(&conn, NOW).unwrap().len(), 3);
    }

    #[test]
    fn test_is_due_boundaries() {
        let (_dir, db) = open();
        let conn = db.conn().unwrap();
        let tracked = TrackedUrl::create(&conn, 1, "https://a.test/", Frequency::Monthly, true, NOW).unwrap();
        TrackedUrl::set_last_checked(&conn, tracked.url_id(), NOW).unwrap();
        let tracked = TrackedUrl::get_by_id(&conn, tracked.url_id()).unwrap().unwrap();

        assert!(!tracked.is_due(NOW + 29 * DAY));
        assert!(tracked.is_due(NOW + 30 * DAY));
    }
}
