// Check States
// 1. Baseline (no prior snapshot)
//      - Write snapshot
//      - Write a "monitoring started" log unless this is an initial check
// 2. Changed (prior snapshot, hash differs)
//      - Write snapshot
//      - Write a log when the field diff is non-empty, unless this is an initial check
// 3. Verify (prior snapshot, hash matches)
//      - Run the same field diff anyway
//      - No differences: Verified. Only last_checked_at is updated
//      - Differences: HashCollision. Handled like Changed, plus an alert

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use log::{error, info, warn, Level};
use logging_timer::timer;
use serde::Serialize;

use crate::changes::{primary_category, ChangeCategory, ChangeRecord};
use crate::diff::Differ;
use crate::error::PagePulseError;
use crate::extractor::Extractor;
use crate::fetcher::PageFetcher;
use crate::hash::Hash;
use crate::logs::{LogSource, NewLog};
use crate::snapshots::NewSnapshot;
use crate::store::MonitorStore;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckState {
    Baseline,
    Changed,
    Verified,
    HashCollision,
}

/// Result of one URL check, as reported to the caller.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckOutcome {
    pub url_id: i64,
    /// True only when a prior snapshot existed, the check was not a
    /// baseline-only check, and at least one change was found.
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub changes: Vec<ChangeRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<CheckState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_public_id: Option<String>,
}

impl CheckOutcome {
    fn failed(url_id: i64, url: Option<String>, err: &PagePulseError) -> Self {
        CheckOutcome {
            url_id,
            error: Some(err.to_string()),
            url,
            ..CheckOutcome::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CheckTarget {
    pub url_id: i64,
    pub project_id: i64,
}

#[derive(Debug, Default, Serialize)]
pub struct BatchSummary {
    pub checked: usize,
    pub changed: usize,
    pub failed: usize,
    pub outcomes: Vec<CheckOutcome>,
}

/// Set of URL ids with a check in flight. At most one check per URL runs
/// at a time within a process.
#[derive(Clone, Default)]
pub struct InFlight {
    urls: Arc<Mutex<HashSet<i64>>>,
}

pub struct InFlightGuard {
    urls: Arc<Mutex<HashSet<i64>>>,
    url_id: i64,
}

impl InFlight {
    pub fn acquire(&self, url_id: i64) -> Result<InFlightGuard, PagePulseError> {
        let mut urls = self.urls.lock().unwrap_or_else(PoisonError::into_inner);
        if !urls.insert(url_id) {
            return Err(PagePulseError::CheckInProgress(url_id));
        }
        Ok(InFlightGuard {
            urls: Arc::clone(&self.urls),
            url_id,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.url_id);
    }
}

pub struct Monitor<F, S> {
    fetcher: F,
    store: S,
    in_flight: InFlight,
}

impl<F: PageFetcher, S: MonitorStore> Monitor<F, S> {
    pub fn new(fetcher: F, store: S) -> Self {
        Monitor {
            fetcher,
            store,
            in_flight: InFlight::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Checks one URL: fetch, extract, hash, compare with the latest snapshot
    /// and persist. Never returns an error; failures are reported in the
    /// outcome so a batch can carry on.
    ///
    /// `is_initial_check` forces baseline behavior: a snapshot is written if
    /// the content differs from what is stored, but no log is created.
    pub async fn check_url(&self, url_id: i64, project_id: i64, is_initial_check: bool) -> CheckOutcome {
        let _guard = match self.in_flight.acquire(url_id) {
            Ok(guard) => guard,
            Err(e) => {
                warn!("Skipping check of url {}: {}", url_id, e);
                return CheckOutcome::failed(url_id, None, &e);
            }
        };

        let url = match self.store.url_for(url_id) {
            Ok(Some(url)) => url,
            Ok(None) => {
                let e = PagePulseError::NotFound(format!("url {}", url_id));
                error!("Check of url {} failed: {}", url_id, e);
                return CheckOutcome::failed(url_id, None, &e);
            }
            Err(e) => {
                error!("Check of url {} failed: {}", url_id, e);
                return CheckOutcome::failed(url_id, None, &e);
            }
        };

        match self.run_check(url_id, project_id, &url, is_initial_check).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Check of {} (url {}) failed: {}", url, url_id, e);
                CheckOutcome::failed(url_id, Some(url), &e)
            }
        }
    }

    /// Checks each target in turn. A failed check never stops the batch.
    pub async fn check_batch(&self, targets: &[CheckTarget]) -> BatchSummary {
        let mut summary = BatchSummary::default();

        for target in targets {
            let outcome = self.check_url(target.url_id, target.project_id, false).await;
            summary.checked += 1;
            if outcome.is_error() {
                summary.failed += 1;
            } else if outcome.changed {
                summary.changed += 1;
            }
            summary.outcomes.push(outcome);
        }

        info!(
            "Batch complete: {} checked, {} changed, {} failed",
            summary.checked, summary.changed, summary.failed
        );
        summary
    }

    async fn run_check(
        &self,
        url_id: i64,
        project_id: i64,
        url: &str,
        is_initial_check: bool,
    ) -> Result<CheckOutcome, PagePulseError> {
        let _tmr = timer!(Level::Debug; "Monitor.run_check", "{}", url);

        let body = self.fetcher.fetch(url).await?;
        let fields = Extractor::extract(&body).fields;
        let content_hash = Hash::content_hash(&fields);
        let now = Utc::now().timestamp();

        let previous = self.store.latest_snapshot(url_id)?;

        let (state, changes) = match &previous {
            None => (CheckState::Baseline, Vec::new()),
            Some(prev) => {
                let changes = Differ::diff_fields(prev.fields(), &fields);
                if prev.content_hash() != content_hash {
                    (CheckState::Changed, changes)
                } else if changes.is_empty() {
                    (CheckState::Verified, changes)
                } else {
                    (CheckState::HashCollision, changes)
                }
            }
        };

        if state == CheckState::Verified {
            self.store.touch_last_checked(url_id, now)?;
            if let Some(prev) = &previous {
                info!(
                    "No change on {} since snapshot {} taken at {}",
                    url,
                    prev.snapshot_id(),
                    prev.created_at()
                );
            }
            return Ok(CheckOutcome {
                url_id,
                url: Some(url.to_owned()),
                state: Some(state),
                ..CheckOutcome::default()
            });
        }

        if state == CheckState::HashCollision {
            warn!(
                "Hash collision detected on {} (url {}): hash {} matched but {} field(s) differ",
                url,
                url_id,
                Hash::short_hash(&Some(content_hash.as_str())),
                changes.len()
            );
        }

        let log = if is_initial_check {
            None
        } else if state == CheckState::Baseline {
            Some(Self::monitoring_started_log(project_id, url, now))
        } else if !changes.is_empty() {
            Some(Self::changes_log(project_id, url, &changes, now))
        } else {
            None
        };

        // Snapshot and log commit together. On failure nothing is stored and
        // the next check sees the same changes again.
        let (_, log_entry) = self.store.record_snapshot(
            NewSnapshot {
                url_id,
                content_hash: content_hash.clone(),
                fields,
                created_at: now,
            },
            log,
        )?;
        let log_public_id = log_entry.map(|entry| entry.public_id().to_owned());

        if state == CheckState::HashCollision {
            if let Err(e) = self.store.add_hash_collision_alert(url_id, &content_hash, now) {
                error!("Failed to record hash collision alert for url {}: {}", url_id, e);
            }
        }

        self.store.touch_last_checked(url_id, now)?;

        let changed = previous.is_some() && !is_initial_check && !changes.is_empty();
        if changed {
            info!("{} change(s) detected on {}", changes.len(), url);
        } else if state == CheckState::Baseline {
            info!("Baseline snapshot captured for {}", url);
        }

        Ok(CheckOutcome {
            url_id,
            changed,
            error: None,
            url: Some(url.to_owned()),
            changes,
            state: Some(state),
            log_public_id,
        })
    }

    fn monitoring_started_log(project_id: i64, url: &str, now: i64) -> NewLog {
        NewLog {
            public_id: NewLog::new_public_id(),
            project_id,
            title: format!("Monitoring started for {}", url),
            description: "Baseline snapshot captured. Future changes to this page will be logged automatically."
                .to_owned(),
            category: ChangeCategory::Other,
            source: LogSource::System,
            changes: Vec::new(),
            created_at: now,
        }
    }

    fn changes_log(project_id: i64, url: &str, changes: &[ChangeRecord], now: i64) -> NewLog {
        let labels: Vec<&str> = changes.iter().map(|c| c.field.as_str()).collect();
        let plural = if changes.len() == 1 { "" } else { "s" };

        NewLog {
            public_id: NewLog::new_public_id(),
            project_id,
            title: format!("Changes detected on {}", url),
            description: format!(
                "Automated monitoring detected {} change{}: {}",
                changes.len(),
                plural,
                labels.join(", ")
            ),
            category: primary_category(changes).unwrap_or(ChangeCategory::Other),
            source: LogSource::System,
            changes: changes.to_vec(),
            created_at: now,
        }
    }
}
