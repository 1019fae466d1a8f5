// Bulk engine constants (ADR: No magic values)

/// Identifiers claimed and executed per poll
pub const BATCH_SIZE: usize = 2;

/// Claims untouched for longer than this are considered abandoned (10s)
pub const STALE_CLAIM_MS: i64 = 10_000;

/// Fixed lifetime of a job record from creation (24 hours, not renewed by activity)
pub const JOB_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// Maximum distinct identifiers accepted in one job
pub const MAX_BULK_ITEMS: usize = 1000;

/// Maximum length of a single item identifier
pub const MAX_ITEM_ID_LEN: usize = 128;

/// Error text kept per failed item
pub const MAX_ERROR_MESSAGE_LEN: usize = 50;
