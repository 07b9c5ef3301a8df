/// Stable internal identifier for a generation task.
///
/// Assigned locally at creation time and never changed afterwards; the
/// backend-assigned job id is tracked separately so that an in-flight
/// rebind can never invalidate a lookup.
pub type TaskId = uuid::Uuid;

/// Credit amounts are whole units on a signed 64-bit ledger.
pub type Credits = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
