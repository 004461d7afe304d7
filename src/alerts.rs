use rusqlite::{named_params, params, Connection};

use crate::error::PagePulseError;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AlertType {
    /// Stored and fresh content hashes matched but the fields differed.
    HashCollision,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::HashCollision => "H",
        }
    }

    pub fn short_str_to_full(s: &str) -> Result<&str, PagePulseError> {
        match s {
            "H" => Ok("Hash Collision"),
            _ => Err(PagePulseError::Error(format!("Invalid alert type: '{}'", s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub alert_id: i64,
    pub alert_type: AlertType,
    pub url_id: i64,
    pub content_hash: String,
    pub created_at: i64,
}

pub struct Alerts;

impl Alerts {
    pub fn add_hash_collision_alert(
        conn: &Connection,
        url_id: i64,
        content_hash: &str,
        created_at: i64,
    ) -> Result<(), PagePulseError> {
        let sql = r#"
            INSERT INTO alerts (
                alert_type,
                url_id,
                content_hash,
                created_at
            )
            VALUES (
                :alert_type,
                :url_id,
                :content_hash,
                :created_at
            )
        "#;

        conn.execute(
            sql,
            named_params! {
                ":alert_type":      AlertType::HashCollision.as_str(),
                ":url_id":          url_id,
                ":content_hash":    content_hash,
                ":created_at":      created_at,
            },
        )?;

        Ok(())
    }

    pub fn list_for_url(conn: &Connection, url_id: i64) -> Result<Vec<Alert>, PagePulseError> {
        let mut stmt = conn.prepare(
            "SELECT alert_id, alert_type, url_id, content_hash, created_at
             FROM alerts
             WHERE url_id = ?
             ORDER BY alert_id",
        )?;
        let rows = stmt.query_map(params![url_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;

        let mut alerts = Vec::new();
        for row in rows {
            let (alert_id, alert_type, url_id, content_hash, created_at) = row?;
            let alert_type = match alert_type.as_str() {
                "H" => AlertType::HashCollision,
                other => {
                    return Err(PagePulseError::Error(format!("Invalid alert type: '{}'", other)))
                }
            };
            alerts.push(Alert {
                alert_id,
                alert_type,
                url_id,
                content_hash,
                created_at,
            });
        }
        Ok(alerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::tracked_urls::{Frequency, TrackedUrl};
    use tempfile::TempDir;

    #[test]
    fn test_alert_type_strings() {
        assert_eq!(AlertType::HashCollision.as_str(), "H");
        assert_eq!(AlertType::short_str_to_full("H").unwrap(), "Hash Collision");
        assert!(AlertType::short_str_to_full("X").is_err());
    }

    #[test]
    fn test_add_and_list() {
        let dir = TempDir::new().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();
        let conn = db.conn().unwrap();
        let url_id = TrackedUrl::create(&conn, 1, "https://acme.test/", Frequency::Daily, true, 0)
            .unwrap()
            .url_id();

        Alerts::add_hash_collision_alert(&conn, url_id, "abc123", 50).unwrap();
        let alerts = Alerts::list_for_url(&conn, url_id).unwrap();

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::HashCollision);
        assert_eq!(alerts[0].content_hash, "abc123");
        assert_eq!(alerts[0].created_at, 50);
    }
}
