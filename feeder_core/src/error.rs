use thiserror::Error;

/// Why a trigger request was not admitted.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// `as_of` not strictly newer than the last admitted trigger.
    #[error("stale trigger: as_of={as_of} <= last_admitted={last_admitted}")]
    Stale { as_of: u64, last_admitted: u64 },
    /// Another feed is still rotating; triggers are never queued.
    #[error("a feed is already in progress")]
    FeedInProgress,
    #[error("invalid rotation count: {0}")]
    InvalidRotationCount(u32),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeederError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("trigger rejected: {0}")]
    Rejected(RejectReason),
    /// History backend failure; the in-memory history is kept.
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<RejectReason> for FeederError {
    fn from(r: RejectReason) -> Self {
        FeederError::Rejected(r)
    }
}

/// A trigger payload that could not be turned into a `FeedRequest`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {0}")]
    Json(String),
    #[error("missing field `{0}`")]
    Missing(&'static str),
    #[error("field `{field}` must be a positive integer, got `{value}`")]
    NotPositive { field: &'static str, value: String },
    #[error("field `{field}` is out of range: `{value}`")]
    OutOfRange { field: &'static str, value: String },
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing rotation sensor")]
    MissingSensor,
    #[error("missing motor")]
    MissingMotor,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
