use rusqlite::{named_params, params, Connection, Row};
use serde::Serialize;
use strum::{AsRefStr, Display, EnumString};

use crate::changes::{ChangeCategory, ChangeRecord};
use crate::error::PagePulseError;

#[derive(AsRefStr, EnumString, Debug, Display, PartialEq, Eq, Copy, Clone, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    System,
    User,
}

/// A log that has not been stored yet.
#[derive(Clone, Debug, PartialEq)]
pub struct NewLog {
    pub public_id: String,
    pub project_id: i64,
    pub title: String,
    pub description: String,
    pub category: ChangeCategory,
    pub source: LogSource,
    pub changes: Vec<ChangeRecord>,
    pub created_at: i64,
}

impl NewLog {
    pub fn new_public_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// A persisted activity record. Changes are stored structurally and
/// rendered to display lines on demand.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogEntry {
    log_id: i64,
    public_id: String,
    project_id: i64,
    title: String,
    description: String,
    category: ChangeCategory,
    source: LogSource,
    changes: Vec<ChangeRecord>,
    created_at: i64,
    url_ids: Vec<i64>,
}

impl LogEntry {
    pub fn from_new(log_id: i64, log: NewLog, url_ids: &[i64]) -> Self {
        LogEntry {
            log_id,
            public_id: log.public_id,
            project_id: log.project_id,
            title: log.title,
            description: log.description,
            category: log.category,
            source: log.source,
            changes: log.changes,
            created_at: log.created_at,
            url_ids: url_ids.to_vec(),
        }
    }

    pub fn log_id(&self) -> i64 {
        self.log_id
    }

    pub fn public_id(&self) -> &str {
        &self.public_id
    }

    pub fn project_id(&self) -> i64 {
        self.project_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category(&self) -> ChangeCategory {
        self.category
    }

    pub fn source(&self) -> LogSource {
        self.source
    }

    pub fn changes(&self) -> &[ChangeRecord] {
        &self.changes
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn url_ids(&self) -> &[i64] {
        &self.url_ids
    }

    pub fn change_lines(&self) -> Vec<String> {
        self.changes.iter().map(ChangeRecord::display_line).collect()
    }

    /// Inserts the log and its join rows to `url_ids`. Run inside a
    /// transaction; a failed join insert leaves the log row behind otherwise.
    pub fn insert(conn: &Connection, log: NewLog, url_ids: &[i64]) -> Result<Self, PagePulseError> {
        let changes_json = serde_json::to_string(&log.changes)?;

        conn.execute(
            "INSERT INTO logs (public_id, project_id, title, description, category, source, changes, created_at)
             VALUES (:public_id, :project_id, :title, :description, :category, :source, :changes, :created_at)",
            named_params! {
                ":public_id":   log.public_id,
                ":project_id":  log.project_id,
                ":title":       log.title,
                ":description": log.description,
                ":category":    log.category.as_ref(),
                ":source":      log.source.as_ref(),
                ":changes":     changes_json,
                ":created_at":  log.created_at,
            },
        )?;
        let log_id = conn.last_insert_rowid();

        for url_id in url_ids {
            conn.execute(
                "INSERT INTO log_urls (log_id, url_id) VALUES (?, ?)",
                params![log_id, url_id],
            )?;
        }

        Ok(LogEntry::from_new(log_id, log, url_ids))
    }

    /// Most recent logs of a project, newest first.
    pub fn list_for_project(
        conn: &Connection,
        project_id: i64,
        count: usize,
    ) -> Result<Vec<Self>, PagePulseError> {
        let mut stmt = conn.prepare(
            "SELECT log_id, public_id, project_id, title, description, category, source, changes, created_at
             FROM logs
             WHERE project_id = ?
             ORDER BY created_at DESC, log_id DESC
             LIMIT ?",
        )?;
        let limit = i64::try_from(count).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![project_id, limit], LogRow::from_row)?;

        let mut logs = Vec::new();
        for row in rows {
            let row = row?;
            let url_ids = Self::url_ids_for(conn, row.log_id)?;
            logs.push(row.into_entry(url_ids)?);
        }
        Ok(logs)
    }

    pub fn list_for_url(conn: &Connection, url_id: i64) -> Result<Vec<Self>, PagePulseError> {
        let mut stmt = conn.prepare(
            "SELECT l.log_id, l.public_id, l.project_id, l.title, l.description, l.category,
                    l.source, l.changes, l.created_at
             FROM logs l
                JOIN log_urls lu ON lu.log_id = l.log_id
             WHERE lu.url_id = ?
             ORDER BY l.created_at DESC, l.log_id DESC",
        )?;
        let rows = stmt.query_map(params![url_id], LogRow::from_row)?;

        let mut logs = Vec::new();
        for row in rows {
            let row = row?;
            let url_ids = Self::url_ids_for(conn, row.log_id)?;
            logs.push(row.into_entry(url_ids)?);
        }
        Ok(logs)
    }

    fn url_ids_for(conn: &Connection, log_id: i64) -> Result<Vec<i64>, PagePulseError> {
        let mut stmt = conn.prepare("SELECT url_id FROM log_urls WHERE log_id = ? ORDER BY url_id")?;
        let ids = stmt
            .query_map(params![log_id], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }
}

/// Raw column values; JSON and enum columns are decoded in `into_entry`.
struct LogRow {
    log_id: i64,
    public_id: String,
    project_id: i64,
    title: String,
    description: String,
    category: String,
    source: String,
    changes: String,
    created_at: i64,
}

impl LogRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(LogRow {
            log_id: row.get(0)?,
            public_id: row.get(1)?,
            project_id: row.get(2)?,
            title: row.get(3)?,
            description: row.get(4)?,
            category: row.get(5)?,
            source: row.get(6)?,
            changes: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn into_entry(self, url_ids: Vec<i64>) -> Result<LogEntry, PagePulseError> {
        let category = self.category.parse::<ChangeCategory>().map_err(|_| {
            PagePulseError::Error(format!("Invalid log category: '{}'", self.category))
        })?;
        let source = self.source.parse::<LogSource>().map_err(|_| {
            PagePulseError::Error(format!("Invalid log source: '{}'", self.source))
        })?;

        Ok(LogEntry {
            log_id: self.log_id,
            public_id: self.public_id,
            project_id: self.project_id,
            title: self.title,
            description: self.description,
            category,
            source,
            changes: serde_json::from_str(&self.changes)?,
            created_at: self.created_at,
            url_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::tracked_urls::{Frequency, TrackedUrl};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Database, i64) {
        let dir = TempDir::new().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();
        let url_id = TrackedUrl::create(&db.conn().unwrap(), 7, "https://acme.test/", Frequency::Daily, true, 0)
            .unwrap()
            .url_id();
        (dir, db, url_id)
    }

    fn new_log(title: &str, created_at: i64) -> NewLog {
        NewLog {
            public_id: NewLog::new_public_id(),
            project_id: 7,
            title: title.to_owned(),
            description: "Automated monitoring detected 1 change: Title".to_owned(),
            category: ChangeCategory::OnPage,
            source: LogSource::System,
            changes: vec![ChangeRecord::new(
                "Title",
                Some("Say \"hi\"".into()),
                Some("Welcome".into()),
                ChangeCategory::OnPage,
            )],
            created_at,
        }
    }

    fn insert(conn: &Connection, log: NewLog, url_ids: &[i64]) -> Result<LogEntry, PagePulseError> {
        Database::immediate_transaction(conn, |conn| LogEntry::insert(conn, log, url_ids))
    }

    #[test]
    fn test_log_source_strings() {
        assert_eq!(LogSource::System.as_ref(), "system");
        assert_eq!("user".parse::<LogSource>().unwrap(), LogSource::User);
    }

    #[test]
    fn test_public_ids_are_unique() {
        assert_ne!(NewLog::new_public_id(), NewLog::new_public_id());
    }

    #[test]
    fn test_insert_and_list_for_project() {
        let (_dir, db, url_id) = setup();
        let conn = db.conn().unwrap();

        let inserted = insert(&conn, new_log("Changes detected", 100), &[url_id]).unwrap();
        let logs = LogEntry::list_for_project(&conn, 7, 10).unwrap();

        assert_eq!(logs, vec![inserted.clone()]);
        assert_eq!(logs[0].url_ids(), &[url_id]);
        assert_eq!(logs[0].source(), LogSource::System);
        assert_eq!(
            logs[0].change_lines(),
            vec!["Title: \"Say \\\"hi\\\"\" → \"Welcome\"".to_string()]
        );
        assert!(LogEntry::list_for_project(&conn, 8, 10).unwrap().is_empty());
    }

    #[test]
    fn test_list_orders_newest_first_and_limits() {
        let (_dir, db, url_id) = setup();
        let conn = db.conn().unwrap();

        insert(&conn, new_log("first", 100), &[url_id]).unwrap();
        insert(&conn, new_log("second", 200), &[url_id]).unwrap();
        insert(&conn, new_log("third", 300), &[url_id]).unwrap();

        let titles: Vec<String> = LogEntry::list_for_project(&conn, 7, 2)
            .unwrap()
            .iter()
            .map(|l| l.title().to_owned())
            .collect();
        assert_eq!(titles, vec!["third", "second"]);
        assert_eq!(LogEntry::list_for_url(&conn, url_id).unwrap().len(), 3);
    }

    #[test]
    fn test_failed_join_rolls_back_log() {
        let (_dir, db, _url_id) = setup();
        let conn = db.conn().unwrap();

        // url 999 does not exist; the foreign key makes the join insert fail
        let result = insert(&conn, new_log("orphan", 100), &[999]);
        assert!(result.is_err());
        assert!(LogEntry::list_for_project(&conn, 7, 10).unwrap().is_empty());
    }
}
