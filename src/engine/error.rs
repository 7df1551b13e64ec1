use ulid::Ulid;

use super::availability::AvailabilityViolation;

#[derive(Debug)]
pub enum EngineError {
    /// Malformed input: bad dates, non-positive room count, oversized fields.
    Validation(String),
    /// The stay cannot be sold: no inventory, min-stay, stop-sell, closed
    /// arrival/departure, party too large.
    Availability(AvailabilityViolation),
    /// Lost a concurrency race: unit lock timed out, or a guarded decrement
    /// covered fewer days than expected. Retryable with backoff.
    Conflict(String),
    NotFound { kind: &'static str, id: Ulid },
    /// The booking is not in a state that permits the operation
    /// (cancel-on-cancelled, cancel-on-completed).
    DomainState(&'static str),
    LimitExceeded(&'static str),
    /// WAL append/compaction failure — nothing was applied.
    Wal(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "validation: {msg}"),
            EngineError::Availability(v) => write!(f, "not available: {v}"),
            EngineError::Conflict(msg) => write!(f, "conflict: {msg}"),
            EngineError::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            EngineError::DomainState(msg) => write!(f, "invalid state: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Wal(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<AvailabilityViolation> for EngineError {
    fn from(v: AvailabilityViolation) -> Self {
        EngineError::Availability(v)
    }
}
