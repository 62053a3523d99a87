//! Error types for leave request adjudication.

use thiserror::Error;

use crate::model::{PeriodId, RequestId, RequestStatus, SubjectId};

/// Top-level error returned by the ledger's public operations.
///
/// No variant is retried automatically by the core; retry policy belongs to
/// the caller. Every failing operation leaves state untouched.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),

    /// The subject has no vested period with a positive balance.
    #[error("subject {subject} has no eligible leave balance")]
    NoEligibleBalance { subject: SubjectId },

    /// The oldest eligible period cannot fund the request. Carries the
    /// period's reference year and remaining balance for user feedback.
    #[error(
        "insufficient balance in oldest period ({reference_year}): \
         {balance_days} days left, {days_requested} requested"
    )]
    InsufficientBalance {
        reference_year: i32,
        balance_days: u32,
        days_requested: u32,
    },

    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// The store could not complete the transaction; effects are fully
    /// rolled back and the caller may retry.
    #[error("storage failure: {0}")]
    StorageFailure(#[from] StorageError),
}

/// Caller-correctable input problems. No state change.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("discount requests must carry an explicit day count")]
    MissingDayCount,

    #[error("day count {0} is outside the allowed 1-30 range")]
    DayCountOutOfRange(u32),

    #[error("explicit day count is not allowed for fixed-block category {0}")]
    DayCountForFixedBlock(&'static str),

    #[error("start date {0} is in the past; retroactive requests are not accepted")]
    RetroactiveStart(chrono::NaiveDate),

    #[error("grant period start {start} is not before its end {end}")]
    InvertedGrantDates {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("subject {subject} already holds a period for year {reference_year}")]
    DuplicateGrant {
        subject: SubjectId,
        reference_year: i32,
    },

    #[error("status cannot change from {from:?} to {to:?}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },
}

/// A referenced row does not exist.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotFoundError {
    #[error("period {0} not found")]
    Period(PeriodId),

    #[error("request {0} not found")]
    Request(RequestId),
}

/// Persistence-level failure. All effects of the failed operation are
/// rolled back.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("timed out waiting for the lock on period {0}")]
    LockTimeout(PeriodId),
}
