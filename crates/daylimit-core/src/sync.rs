//! Cache-to-database sync history types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What triggered a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncType {
    /// The periodic timer tick.
    Scheduled,
    /// The admin endpoint.
    Manual,
    /// The optional flush after startup warm.
    Startup,
    /// The final blocking flush during shutdown.
    Shutdown,
}

impl SyncType {
    /// Persisted representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "SCHEDULED",
            Self::Manual => "MANUAL",
            Self::Startup => "STARTUP",
            Self::Shutdown => "SHUTDOWN",
        }
    }
}

impl fmt::Display for SyncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SCHEDULED" => Ok(Self::Scheduled),
            "MANUAL" => Ok(Self::Manual),
            "STARTUP" => Ok(Self::Startup),
            "SHUTDOWN" => Ok(Self::Shutdown),
            other => Err(format!("unknown sync type: {other}")),
        }
    }
}

/// How a sync run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    /// Every dirty key was written back.
    Success,
    /// The run completed but one or more keys failed and stay dirty.
    Partial,
    /// The run itself failed.
    Failed,
}

impl SyncStatus {
    /// Persisted representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Partial => "PARTIAL",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(Self::Success),
            "PARTIAL" => Ok(Self::Partial),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unknown sync status: {other}")),
        }
    }
}

/// One row of sync history. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRecord {
    /// Row id, assigned by the record store.
    pub id: Option<i64>,
    /// What triggered the run.
    pub sync_type: SyncType,
    /// Number of keys written back.
    pub records_synced: i64,
    /// Run duration in milliseconds, set on completion.
    pub duration_ms: Option<i64>,
    /// How the run ended.
    pub status: SyncStatus,
    /// Error detail for failed or partial runs.
    pub error_message: Option<String>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run ended.
    pub completed_at: Option<DateTime<Utc>>,
}

impl SyncRecord {
    /// Open a record at the start of a run.
    #[must_use]
    pub fn start(sync_type: SyncType) -> Self {
        Self {
            id: None,
            sync_type,
            records_synced: 0,
            duration_ms: None,
            status: SyncStatus::Success,
            error_message: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Close the record as fully successful.
    pub fn complete(&mut self, records_synced: i64) {
        self.finish();
        self.records_synced = records_synced;
        self.status = SyncStatus::Success;
    }

    /// Close the record as partially successful: some keys synced, some
    /// failed and remain dirty.
    pub fn partial(&mut self, records_synced: i64, error_message: impl Into<String>) {
        self.finish();
        self.records_synced = records_synced;
        self.status = SyncStatus::Partial;
        self.error_message = Some(error_message.into());
    }

    /// Close the record as failed.
    pub fn fail(&mut self, error_message: impl Into<String>) {
        self.finish();
        self.status = SyncStatus::Failed;
        self.error_message = Some(error_message.into());
    }

    fn finish(&mut self) {
        let completed = Utc::now();
        self.completed_at = Some(completed);
        self.duration_ms = Some((completed - self.started_at).num_milliseconds());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_and_status_roundtrip() {
        for t in [
            SyncType::Scheduled,
            SyncType::Manual,
            SyncType::Startup,
            SyncType::Shutdown,
        ] {
            assert_eq!(t.as_str().parse::<SyncType>().unwrap(), t);
        }
        for s in [SyncStatus::Success, SyncStatus::Partial, SyncStatus::Failed] {
            assert_eq!(s.as_str().parse::<SyncStatus>().unwrap(), s);
        }
    }

    #[test]
    fn record_lifecycle() {
        let mut record = SyncRecord::start(SyncType::Manual);
        assert_eq!(record.status, SyncStatus::Success);
        assert!(record.completed_at.is_none());

        record.complete(7);
        assert_eq!(record.records_synced, 7);
        assert_eq!(record.status, SyncStatus::Success);
        assert!(record.completed_at.is_some());
        assert!(record.duration_ms.is_some());
    }

    #[test]
    fn record_failure_captures_message() {
        let mut record = SyncRecord::start(SyncType::Scheduled);
        record.fail("database unreachable");

        assert_eq!(record.status, SyncStatus::Failed);
        assert_eq!(record.error_message.as_deref(), Some("database unreachable"));
        assert_eq!(record.records_synced, 0);
    }

    #[test]
    fn record_partial_keeps_count() {
        let mut record = SyncRecord::start(SyncType::Scheduled);
        record.partial(3, "2 keys failed");

        assert_eq!(record.status, SyncStatus::Partial);
        assert_eq!(record.records_synced, 3);
    }

    #[test]
    fn serde_wire_format() {
        assert_eq!(
            serde_json::to_string(&SyncType::Scheduled).unwrap(),
            "\"SCHEDULED\""
        );
        assert_eq!(
            serde_json::to_string(&SyncStatus::Partial).unwrap(),
            "\"PARTIAL\""
        );
        let parsed: SyncStatus = serde_json::from_str("\"FAILED\"").unwrap();
        assert_eq!(parsed, SyncStatus::Failed);
    }
}
