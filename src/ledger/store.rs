//! In-memory period store.
//!
//! Owns the acquisitive periods and leave requests. Everything immutable
//! after creation lives outside the locks; the only mutable state is a
//! period's balance and a request's workflow status, each behind its own
//! async mutex so operations on different periods never contend.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::timeout;

use super::error::{InputError, NotFoundError, RequestError, StorageError};
use crate::model::{
    AcquisitivePeriod, GRANT_DAYS, LeaveRequest, PeriodId, RequestCategory, RequestId,
    RequestStatus, SubjectId,
};

/// Upper bound on waiting for a period's lock. Expiry surfaces as
/// [`StorageError::LockTimeout`], never an unbounded stall.
const LOCK_WAIT: Duration = Duration::from_secs(5);

/// One stored period: immutable grant metadata plus the locked balance.
pub(crate) struct PeriodSlot {
    pub(crate) id: PeriodId,
    pub(crate) subject_id: SubjectId,
    pub(crate) reference_year: i32,
    pub(crate) period_start: NaiveDate,
    pub(crate) period_end: NaiveDate,
    balance_days: Mutex<u32>,
}

impl PeriodSlot {
    async fn snapshot(&self) -> AcquisitivePeriod {
        AcquisitivePeriod {
            id: self.id,
            subject_id: self.subject_id,
            reference_year: self.reference_year,
            period_start: self.period_start,
            period_end: self.period_end,
            balance_days: *self.balance_days.lock().await,
        }
    }
}

/// Mutable part of a stored request, owned by the workflow transitions.
pub(crate) struct RequestState {
    pub(crate) status: RequestStatus,
    pub(crate) rejection_reason: Option<String>,
}

/// One stored request: immutable creation data plus the locked workflow
/// state. The ledger holds the state lock across a terminal transition so
/// the matching credit-back runs exactly once.
pub(crate) struct RequestSlot {
    pub(crate) id: RequestId,
    pub(crate) subject_id: SubjectId,
    pub(crate) period_id: PeriodId,
    pub(crate) start_date: NaiveDate,
    pub(crate) end_date: NaiveDate,
    pub(crate) days_requested: u32,
    pub(crate) category: RequestCategory,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) state: Mutex<RequestState>,
}

impl RequestSlot {
    pub(crate) fn snapshot_with(&self, state: &RequestState) -> LeaveRequest {
        LeaveRequest {
            id: self.id,
            subject_id: self.subject_id,
            period_id: self.period_id,
            start_date: self.start_date,
            end_date: self.end_date,
            days_requested: self.days_requested,
            category: self.category,
            status: state.status,
            rejection_reason: state.rejection_reason.clone(),
            created_at: self.created_at,
        }
    }

    async fn snapshot(&self) -> LeaveRequest {
        let state = self.state.lock().await;
        self.snapshot_with(&state)
    }
}

/// Fields of a request about to be committed, resolved by the allocator.
pub(crate) struct NewRequest {
    pub(crate) subject_id: SubjectId,
    pub(crate) category: RequestCategory,
    pub(crate) start_date: NaiveDate,
    pub(crate) end_date: NaiveDate,
    pub(crate) days_requested: u32,
}

/// The store itself. Keyed by id; the `(subject, year)` index enforces the
/// one-grant-per-year rule atomically.
pub struct PeriodStore {
    periods: DashMap<PeriodId, Arc<PeriodSlot>>,
    requests: DashMap<RequestId, Arc<RequestSlot>>,
    grant_index: DashMap<(SubjectId, i32), PeriodId>,
    next_period_id: AtomicU64,
    next_request_id: AtomicU64,
}

impl PeriodStore {
    pub fn new() -> Self {
        Self {
            periods: DashMap::new(),
            requests: DashMap::new(),
            grant_index: DashMap::new(),
            next_period_id: AtomicU64::new(1),
            next_request_id: AtomicU64::new(1),
        }
    }

    /// Create a period with a fresh [`GRANT_DAYS`] balance. At most one
    /// period may exist per subject and reference year.
    pub(crate) async fn grant_period(
        &self,
        subject: SubjectId,
        reference_year: i32,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<AcquisitivePeriod, RequestError> {
        let id = self.next_period_id.fetch_add(1, Ordering::Relaxed);

        // entry() makes the uniqueness check and the reservation atomic
        match self.grant_index.entry((subject, reference_year)) {
            Entry::Occupied(_) => {
                return Err(InputError::DuplicateGrant {
                    subject,
                    reference_year,
                }
                .into());
            }
            Entry::Vacant(entry) => {
                entry.insert(id);
            }
        }

        let slot = Arc::new(PeriodSlot {
            id,
            subject_id: subject,
            reference_year,
            period_start,
            period_end,
            balance_days: Mutex::new(GRANT_DAYS),
        });
        self.periods.insert(id, Arc::clone(&slot));
        Ok(slot.snapshot().await)
    }

    /// Periods usable by `subject` as of `as_of`: vested and with a
    /// positive balance, oldest grant first.
    pub(crate) async fn find_eligible_periods(
        &self,
        subject: SubjectId,
        as_of: NaiveDate,
    ) -> Vec<AcquisitivePeriod> {
        let mut slots: Vec<Arc<PeriodSlot>> = self
            .periods
            .iter()
            .filter(|entry| entry.subject_id == subject && entry.period_end <= as_of)
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        slots.sort_by_key(|slot| slot.reference_year);

        let mut eligible = Vec::new();
        for slot in slots {
            let snapshot = slot.snapshot().await;
            if snapshot.balance_days > 0 {
                eligible.push(snapshot);
            }
        }
        eligible
    }

    /// Atomically re-check the balance, debit it, and insert the request
    /// row. The period lock is held for the whole check-decrement-insert
    /// sequence, so a submission that lost the race to an earlier debit
    /// fails here with `InsufficientBalance` and changes nothing.
    pub(crate) async fn commit_debit_and_create_request(
        &self,
        period_id: PeriodId,
        fields: NewRequest,
    ) -> Result<LeaveRequest, RequestError> {
        let slot = self.period_slot(period_id)?;
        let mut balance = lock_balance(&slot).await?;

        if *balance < fields.days_requested {
            return Err(RequestError::InsufficientBalance {
                reference_year: slot.reference_year,
                balance_days: *balance,
                days_requested: fields.days_requested,
            });
        }
        *balance -= fields.days_requested;

        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let request = Arc::new(RequestSlot {
            id,
            subject_id: fields.subject_id,
            period_id,
            start_date: fields.start_date,
            end_date: fields.end_date,
            days_requested: fields.days_requested,
            category: fields.category,
            created_at: Utc::now(),
            state: Mutex::new(RequestState {
                status: RequestStatus::Requested,
                rejection_reason: None,
            }),
        });
        self.requests.insert(id, Arc::clone(&request));
        // lock released after the insert; balance and row move together
        drop(balance);

        Ok(request.snapshot().await)
    }

    /// Reverse a committed debit: add the request's days back to its
    /// funding period. Not idempotent; the caller must guarantee
    /// at-most-once invocation per request.
    pub(crate) async fn credit_back(&self, request_id: RequestId) -> Result<(), RequestError> {
        let request = self.request_slot(request_id)?;
        let period = self.period_slot(request.period_id)?;
        let mut balance = lock_balance(&period).await?;
        *balance += request.days_requested;
        Ok(())
    }

    pub(crate) fn period_slot(&self, id: PeriodId) -> Result<Arc<PeriodSlot>, RequestError> {
        self.periods
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| NotFoundError::Period(id).into())
    }

    pub(crate) fn request_slot(&self, id: RequestId) -> Result<Arc<RequestSlot>, RequestError> {
        self.requests
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| NotFoundError::Request(id).into())
    }

    /// All of a subject's periods, oldest grant first.
    pub(crate) async fn list_periods(&self, subject: SubjectId) -> Vec<AcquisitivePeriod> {
        let mut slots: Vec<Arc<PeriodSlot>> = self
            .periods
            .iter()
            .filter(|entry| entry.subject_id == subject)
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        slots.sort_by_key(|slot| slot.reference_year);

        let mut periods = Vec::with_capacity(slots.len());
        for slot in slots {
            periods.push(slot.snapshot().await);
        }
        periods
    }

    /// All of a subject's requests, newest first.
    pub(crate) async fn list_requests(&self, subject: SubjectId) -> Vec<LeaveRequest> {
        let slots: Vec<Arc<RequestSlot>> = self
            .requests
            .iter()
            .filter(|entry| entry.subject_id == subject)
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut requests = Vec::with_capacity(slots.len());
        for slot in slots {
            requests.push(slot.snapshot().await);
        }
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        requests
    }

    /// Every period in the store, grouped by subject, oldest grant first.
    pub(crate) async fn all_periods(&self) -> Vec<AcquisitivePeriod> {
        let mut slots: Vec<Arc<PeriodSlot>> = self
            .periods
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        slots.sort_by_key(|slot| (slot.subject_id, slot.reference_year));

        let mut periods = Vec::with_capacity(slots.len());
        for slot in slots {
            periods.push(slot.snapshot().await);
        }
        periods
    }

    /// Sum of remaining balances across all of a subject's periods.
    pub(crate) async fn total_balance(&self, subject: SubjectId) -> u32 {
        self.list_periods(subject)
            .await
            .iter()
            .map(|p| p.balance_days)
            .sum()
    }
}

impl Default for PeriodStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded-wait acquisition of a period's balance lock.
async fn lock_balance(slot: &PeriodSlot) -> Result<MutexGuard<'_, u32>, RequestError> {
    timeout(LOCK_WAIT, slot.balance_days.lock())
        .await
        .map_err(|_| StorageError::LockTimeout(slot.id).into())
}
