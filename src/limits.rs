//! Operational guardrails. Every cap here exists to bound memory, WAL growth,
//! or lock hold time on a single tenant engine.

/// Maximum number of tenant engines a single server process will load.
pub const MAX_TENANTS: usize = 256;

/// Maximum length of a tenant (database) name.
pub const MAX_TENANT_NAME_LEN: usize = 256;

/// Maximum rooms registered per tenant.
pub const MAX_ROOMS_PER_TENANT: usize = 5_000;

/// Maximum rate plans registered per tenant.
pub const MAX_RATE_PLANS_PER_TENANT: usize = 500;

/// Maximum (room, rate plan) ledger units per tenant.
pub const MAX_UNITS_PER_TENANT: usize = 20_000;

/// Maximum length of room / rate-plan / guest names and the booking channel tag.
pub const MAX_NAME_LEN: usize = 200;

/// Maximum length of a guest email address (RFC 5321 limit).
pub const MAX_EMAIL_LEN: usize = 254;

/// Maximum length of the free-text special requests field.
pub const MAX_SPECIAL_REQUESTS_LEN: usize = 2_000;

/// Maximum nights in a single stay.
pub const MAX_STAY_NIGHTS: u32 = 90;

/// How far into the future a check-in date may lie.
pub const MAX_ADVANCE_DAYS: i64 = 730;

/// How far into the past a bulk inventory update may reach. Channel
/// managers occasionally re-push recent history; anything older is noise.
pub const MAX_BACKFILL_DAYS: i64 = 366;

/// Maximum rooms requested in one booking.
pub const MAX_ROOMS_PER_BOOKING: u32 = 50;

/// Widest calendar window a single read query may cover, in days.
pub const MAX_QUERY_WINDOW_DAYS: i64 = 400;

/// Maximum items in one bulk inventory batch.
pub const MAX_BATCH_ITEMS: usize = 1_000;

/// Maximum entries in a per-day restrictions map.
pub const MAX_RESTRICTION_ENTRIES: usize = 32;

/// How long a booking transaction waits for its unit lock before giving up
/// with a retryable conflict.
pub const UNIT_LOCK_TIMEOUT_MS: u64 = 5_000;

/// Bounded regeneration attempts for a colliding booking reference.
pub const MAX_REFERENCE_ATTEMPTS: usize = 8;
