//! Leave request adjudication.
//!
//! The ledger selects the period to debit, validates the balance, and
//! commits the debit together with the request row. It also owns the
//! workflow status transitions, re-crediting the funding period when a
//! request is rejected or cancelled. Also supports an async stream of
//! operations for replay.

use chrono::{Days, NaiveDate, Utc};
use tokio_stream::{Stream, StreamExt};
use tracing::info;

use crate::model::{
    AcquisitivePeriod, LeaveRequest, Operation, RequestCategory, RequestId, RequestStatus,
    SubjectId,
};

mod store;
use store::{NewRequest, PeriodStore};

mod error;
pub use error::{InputError, NotFoundError, RequestError, StorageError};

/// The leave balance ledger.
///
/// Holds the period store and the evaluation date used for vesting and
/// retroactivity checks.
pub struct Ledger {
    store: PeriodStore,
    today: NaiveDate,
}

/// Public API
impl Ledger {
    /// Ledger evaluating against the current date.
    pub fn new() -> Self {
        Self::with_today(Utc::now().date_naive())
    }

    /// Ledger pinned to a fixed evaluation date, for replay and tests.
    pub fn with_today(today: NaiveDate) -> Self {
        Self {
            store: PeriodStore::new(),
            today,
        }
    }

    /// Run the ledger over the given operation stream. Failed operations
    /// are logged and skipped; the stream is never interrupted.
    pub async fn run(&self, mut stream: impl Stream<Item = Operation> + Unpin) {
        while let Some(op) = stream.next().await {
            let _ = self.apply(op).await;
        }
    }

    /// Apply a single operation, logging the outcome.
    pub async fn apply(&self, op: Operation) -> Result<(), RequestError> {
        match op {
            Operation::Grant {
                subject,
                reference_year,
                period_start,
                period_end,
            } => {
                let result = self
                    .grant_period(subject, reference_year, period_start, period_end)
                    .await;
                match &result {
                    Ok(period) => {
                        info!(subject, reference_year, period = period.id, "grant applied")
                    }
                    Err(e) => info!(subject, reference_year, reason = %e, "grant skipped"),
                }
                result.map(|_| ())
            }
            Operation::Submit {
                subject,
                category,
                start_date,
                explicit_days,
            } => {
                let result = self
                    .submit_request(subject, category, start_date, explicit_days)
                    .await;
                match &result {
                    Ok(request) => info!(
                        subject,
                        request = request.id,
                        days = request.days_requested,
                        category = category.as_str(),
                        "request accepted"
                    ),
                    Err(e) => info!(
                        subject,
                        category = category.as_str(),
                        reason = %e,
                        "request refused"
                    ),
                }
                result.map(|_| ())
            }
            Operation::Transition {
                request,
                status,
                reason,
            } => {
                let result = self.transition_status(request, status, reason).await;
                match &result {
                    Ok(_) => info!(request, status = status.as_str(), "transition applied"),
                    Err(e) => info!(request, status = status.as_str(), reason = %e, "transition refused"),
                }
                result.map(|_| ())
            }
        }
    }

    /// Entry point for the external accrual process: one 30-day grant per
    /// subject per year.
    pub async fn grant_period(
        &self,
        subject: SubjectId,
        reference_year: i32,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<AcquisitivePeriod, RequestError> {
        if period_start >= period_end {
            return Err(InputError::InvertedGrantDates {
                start: period_start,
                end: period_end,
            }
            .into());
        }
        self.store
            .grant_period(subject, reference_year, period_start, period_end)
            .await
    }

    /// Adjudicate a leave request.
    ///
    /// The oldest vested period with a positive balance is the only one
    /// ever tested: if it cannot fund the request the whole request is
    /// refused, even when a later period could. Oldest balance must be
    /// exhausted first, never spilled over.
    pub async fn submit_request(
        &self,
        subject: SubjectId,
        category: RequestCategory,
        start_date: NaiveDate,
        explicit_days: Option<u32>,
    ) -> Result<LeaveRequest, RequestError> {
        let days_requested = resolve_days(category, explicit_days)?;

        if start_date < self.today {
            return Err(InputError::RetroactiveStart(start_date).into());
        }
        let end_date = start_date + Days::new(u64::from(days_requested - 1));

        let eligible = self.store.find_eligible_periods(subject, self.today).await;
        let Some(target) = eligible.first() else {
            return Err(RequestError::NoEligibleBalance { subject });
        };

        if target.balance_days < days_requested {
            return Err(RequestError::InsufficientBalance {
                reference_year: target.reference_year,
                balance_days: target.balance_days,
                days_requested,
            });
        }

        // the store re-checks the balance under the period lock, so losing
        // a race past this point still cannot overdraw
        self.store
            .commit_debit_and_create_request(
                target.id,
                NewRequest {
                    subject_id: subject,
                    category,
                    start_date,
                    end_date,
                    days_requested,
                },
            )
            .await
    }

    /// Apply a workflow status transition.
    ///
    /// Rejection and cancellation re-credit the funding period as part of
    /// the same operation, under the request's state lock, so the credit
    /// runs exactly once per request.
    pub async fn transition_status(
        &self,
        request_id: RequestId,
        new_status: RequestStatus,
        reason: Option<String>,
    ) -> Result<LeaveRequest, RequestError> {
        let slot = self.store.request_slot(request_id)?;
        let mut state = slot.state.lock().await;

        if !state.status.can_transition_to(new_status) {
            return Err(InputError::InvalidTransition {
                from: state.status,
                to: new_status,
            }
            .into());
        }

        if new_status.credits_back() {
            self.store.credit_back(request_id).await?;
        }
        state.status = new_status;
        if new_status == RequestStatus::Rejected {
            state.rejection_reason = reason;
        }

        Ok(slot.snapshot_with(&state))
    }

    /// A subject's periods, oldest grant first. Read-only.
    pub async fn list_periods(&self, subject: SubjectId) -> Vec<AcquisitivePeriod> {
        self.store.list_periods(subject).await
    }

    /// A subject's requests, newest first. Read-only.
    pub async fn list_requests(&self, subject: SubjectId) -> Vec<LeaveRequest> {
        self.store.list_requests(subject).await
    }

    /// Every period in the ledger, grouped by subject, oldest grant first.
    /// Used for replay output.
    pub async fn all_periods(&self) -> Vec<AcquisitivePeriod> {
        self.store.all_periods().await
    }

    /// Remaining days across all of a subject's periods.
    pub async fn total_balance(&self, subject: SubjectId) -> u32 {
        self.store.total_balance(subject).await
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve the day count implied by a category.
fn resolve_days(
    category: RequestCategory,
    explicit_days: Option<u32>,
) -> Result<u32, InputError> {
    match (category.fixed_days(), explicit_days) {
        (Some(days), None) => Ok(days),
        (Some(_), Some(_)) => Err(InputError::DayCountForFixedBlock(category.as_str())),
        (None, None) => Err(InputError::MissingDayCount),
        (None, Some(days)) if (1..=30).contains(&days) => Ok(days),
        (None, Some(days)) => Err(InputError::DayCountOutOfRange(days)),
    }
}
