use chrono::{DateTime, Utc};

use crate::alerts::{Alert, AlertType};
use crate::error::PagePulseError;
use crate::extractor::Extraction;
use crate::hash::Hash;
use crate::logs::LogEntry;
use crate::monitor::{BatchSummary, CheckOutcome, CheckState};
use crate::tracked_urls::TrackedUrl;

pub struct Reports {
    // No fields
}

impl Reports {
    pub fn print_tracked_url(tracked: &TrackedUrl) {
        println!("{}", Self::format_tracked_url(tracked));
    }

    pub fn print_outcome(outcome: &CheckOutcome) {
        println!("{}", Self::format_outcome(outcome));
    }

    pub fn print_batch(summary: &BatchSummary) {
        for outcome in &summary.outcomes {
            Self::print_outcome(outcome);
        }
        println!(
            "Checked: {}, Changed: {}, Failed: {}",
            summary.checked, summary.changed, summary.failed
        );
    }

    pub fn print_logs(logs: &[LogEntry]) {
        if logs.is_empty() {
            println!("No logs");
            return;
        }
        for log in logs {
            println!("{}", Self::format_log(log));
        }
    }

    pub fn print_alerts(alerts: &[Alert]) -> Result<(), PagePulseError> {
        if alerts.is_empty() {
            println!("No alerts");
            return Ok(());
        }
        for alert in alerts {
            println!("{}", Self::format_alert(alert)?);
        }
        Ok(())
    }

    pub fn print_extraction(extraction: &Extraction) -> Result<(), PagePulseError> {
        let report = serde_json::json!({
            "contentHash": Hash::content_hash(&extraction.fields),
            "fields": extraction.fields.to_json(),
            "jsonLdFailures": extraction.json_ld_failures,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }

    fn format_tracked_url(tracked: &TrackedUrl) -> String {
        format!(
            "Url {} (project {}): {} [{}, {}]",
            tracked.url_id(),
            tracked.project_id(),
            tracked.url(),
            tracked.frequency(),
            if tracked.monitoring_enabled() { "enabled" } else { "disabled" }
        )
    }

    fn format_outcome(outcome: &CheckOutcome) -> String {
        let url = outcome.url.as_deref().unwrap_or("-");

        if let Some(err) = &outcome.error {
            return format!("[url {}] {}: FAILED - {}", outcome.url_id, url, err);
        }

        let state = match outcome.state {
            Some(CheckState::Baseline) => "baseline captured",
            Some(CheckState::Verified) => "no change",
            Some(CheckState::Changed) | Some(CheckState::HashCollision) if outcome.changed => "changed",
            Some(CheckState::Changed) | Some(CheckState::HashCollision) => "snapshot updated",
            None => "-",
        };

        let mut out = format!("[url {}] {}: {}", outcome.url_id, url, state);
        if outcome.state == Some(CheckState::HashCollision) {
            out.push_str(" (hash collision)");
        }
        if let Some(public_id) = &outcome.log_public_id {
            out.push_str(&format!(" log {}", public_id));
        }
        for change in &outcome.changes {
            out.push_str("\n    ");
            out.push_str(&change.display_line());
        }
        out
    }

    fn format_log(log: &LogEntry) -> String {
        let mut out = format!(
            "#{}  {}  {}  [{}/{}]  {}\n  {}",
            log.log_id(),
            Self::format_time(log.created_at()),
            log.public_id(),
            log.category(),
            log.source(),
            log.title(),
            log.description()
        );
        for change in log.changes() {
            out.push_str("\n    ");
            out.push_str(&change.display_line());
        }
        out
    }

    fn format_alert(alert: &Alert) -> Result<String, PagePulseError> {
        Ok(format!(
            "{}  {}  url {}  hash {}",
            Self::format_time(alert.created_at),
            AlertType::short_str_to_full(alert.alert_type.as_str())?,
            alert.url_id,
            Hash::short_hash(&Some(alert.content_hash.as_str()))
        ))
    }

    fn format_time(timestamp: i64) -> String {
        DateTime::<Utc>::from_timestamp(timestamp, 0)
            .unwrap_or_default()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::{ChangeCategory, ChangeRecord};
    use crate::logs::{LogSource, NewLog};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_failed_outcome() {
        let outcome = CheckOutcome {
            url_id: 3,
            url: Some("https://acme.test/".into()),
            error: Some("HTTP 404: Not Found".into()),
            ..CheckOutcome::default()
        };
        assert_eq!(
            Reports::format_outcome(&outcome),
            "[url 3] https://acme.test/: FAILED - HTTP 404: Not Found"
        );
    }

    #[test]
    fn test_format_changed_outcome_lists_changes() {
        let outcome = CheckOutcome {
            url_id: 1,
            changed: true,
            url: Some("https://acme.test/".into()),
            changes: vec![ChangeRecord::new(
                "Title",
                Some("Home".into()),
                Some("Welcome".into()),
                ChangeCategory::OnPage,
            )],
            state: Some(CheckState::Changed),
            log_public_id: Some("abc".into()),
            ..CheckOutcome::default()
        };
        assert_eq!(
            Reports::format_outcome(&outcome),
            "[url 1] https://acme.test/: changed log abc\n    Title: \"Home\" → \"Welcome\""
        );
    }

    #[test]
    fn test_format_initial_change_is_not_reported_as_changed() {
        let outcome = CheckOutcome {
            url_id: 1,
            url: Some("https://acme.test/".into()),
            state: Some(CheckState::Changed),
            ..CheckOutcome::default()
        };
        assert_eq!(
            Reports::format_outcome(&outcome),
            "[url 1] https://acme.test/: snapshot updated"
        );
    }

    #[test]
    fn test_format_log() {
        let log = LogEntry::from_new(
            1,
            NewLog {
                public_id: "p-1".into(),
                project_id: 2,
                title: "Changes detected on https://acme.test/".into(),
                description: "Automated monitoring detected 1 change: H1".into(),
                category: ChangeCategory::OnPage,
                source: LogSource::System,
                changes: vec![ChangeRecord::new("H1", None, Some("Hi".into()), ChangeCategory::OnPage)],
                created_at: 0,
            },
            &[1],
        );
        assert_eq!(
            Reports::format_log(&log),
            "#1  1970-01-01 00:00:00  p-1  [On-Page/system]  Changes detected on https://acme.test/\n  \
             Automated monitoring detected 1 change: H1\n    H1: \"(empty)\" → \"Hi\""
        );
    }

    #[test]
    fn test_format_alert() {
        let alert = Alert {
            alert_id: 1,
            alert_type: AlertType::HashCollision,
            url_id: 4,
            content_hash: "0123456789abcdef".into(),
            created_at: 86_400,
        };
        assert_eq!(
            Reports::format_alert(&alert).unwrap(),
            "1970-01-02 00:00:00  Hash Collision  url 4  hash 0123456"
        );
    }
}
