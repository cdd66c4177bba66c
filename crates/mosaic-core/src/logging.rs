//! Structured logging schema and field name constants for mosaic.
//!
//! All crates use these constants for consistent structured logging fields.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, search completions |
//! | DEBUG | Decision points, intermediate counts, config choices |
//! | TRACE | Per-candidate scores, per-token hits |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "search", "db", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "orchestrator", "similarity", "unified", "composer", "tag_stats", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "search", "similar", "unified", "compose"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Dataset the request is scoped to.
pub const DATASET_ID: &str = "dataset_id";

/// Stack UUID being operated on (e.g. a similarity reference).
pub const STACK_ID: &str = "stack_id";

/// Search mode ("all", "similar", "unified").
pub const MODE: &str = "mode";

/// Free-text query.
pub const QUERY: &str = "query";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of IDs returned in a page.
pub const RESULT_COUNT: &str = "result_count";

/// Total matches before pagination.
pub const TOTAL: &str = "total";

/// Number of similarity candidates scored.
pub const CANDIDATE_COUNT: &str = "candidate_count";

/// Number of free-text tokens.
pub const TOKEN_COUNT: &str = "token_count";

/// Number of filter predicates applied.
pub const PREDICATE_COUNT: &str = "predicate_count";

// ─── Cache fields ──────────────────────────────────────────────────────────

/// Entries served from the tag statistics cache.
pub const CACHE_HITS: &str = "cache_hits";

/// Entries fetched from the store.
pub const CACHE_MISSES: &str = "cache_misses";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
