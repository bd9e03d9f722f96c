/// Task identifiers are opaque UUIDs generated at submission time.
pub type TaskId = uuid::Uuid;

/// Batch identifiers are opaque UUIDs generated at submission time.
pub type BatchId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Reference to a stored image artifact (upload or result), as an
/// ownership-stable path string. The core never reads the bytes behind it.
pub type ArtifactRef = String;
