//! Database schema.
//!
//! Applied at open. The CHECK constraints encode the conservation
//! invariant at the row level: a write that would break
//! `initial_limit = remaining + consumed` is rejected, which also rejects
//! a sync write-back torn by a concurrent consume (the key stays dirty
//! and the next tick writes a consistent pair).

/// `daily_limits`: one row per calendar date.
pub const DAILY_LIMITS: &str = "
CREATE TABLE IF NOT EXISTS daily_limits (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    day_date          TEXT    NOT NULL UNIQUE,
    initial_limit     INTEGER NOT NULL CHECK (initial_limit >= 0),
    remaining         INTEGER NOT NULL CHECK (remaining >= 0),
    consumed          INTEGER NOT NULL CHECK (consumed >= 0),
    transaction_count INTEGER NOT NULL DEFAULT 0,
    version           INTEGER NOT NULL DEFAULT 0,
    created_at        TEXT    NOT NULL,
    updated_at        TEXT    NOT NULL,
    CHECK (initial_limit = remaining + consumed)
)";

/// `sync_history`: one row per sync attempt, append-only.
pub const SYNC_HISTORY: &str = "
CREATE TABLE IF NOT EXISTS sync_history (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    sync_type      TEXT    NOT NULL,
    records_synced INTEGER NOT NULL DEFAULT 0,
    duration_ms    INTEGER,
    status         TEXT    NOT NULL CHECK (status IN ('SUCCESS', 'PARTIAL', 'FAILED')),
    error_message  TEXT,
    started_at     TEXT    NOT NULL,
    completed_at   TEXT
)";

/// Index for the sliding-window sync stats queries.
pub const SYNC_HISTORY_STARTED_AT_IDX: &str =
    "CREATE INDEX IF NOT EXISTS idx_sync_history_started_at ON sync_history (started_at)";

/// All statements to run at open, in order.
#[must_use]
pub fn all_statements() -> Vec<&'static str> {
    vec![DAILY_LIMITS, SYNC_HISTORY, SYNC_HISTORY_STARTED_AT_IDX]
}
