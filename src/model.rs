//! Core domain types for the leave balance ledger.

use chrono::{DateTime, NaiveDate, Utc};

/// Subject (leave holder) identifier.
pub type SubjectId = u32;

/// Acquisitive period identifier.
pub type PeriodId = u64;

/// Leave request identifier.
pub type RequestId = u64;

/// Number of leave-days granted to a period at creation.
pub const GRANT_DAYS: u32 = 30;

/// One year's leave grant for one subject.
///
/// The balance starts at [`GRANT_DAYS`] and is debited by the ledger as
/// requests are accepted. It is a `u32`, so it can never go negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitivePeriod {
    pub id: PeriodId,
    pub subject_id: SubjectId,
    /// The accrual year this grant represents, e.g. 2024.
    pub reference_year: i32,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub balance_days: u32,
}

impl AcquisitivePeriod {
    /// A period becomes usable ("vested") only once its end date has passed.
    pub fn is_vested(&self, as_of: NaiveDate) -> bool {
        self.period_end <= as_of
    }
}

/// The shape of a leave request.
///
/// Wire tokens are inherited from the upstream HR system and kept as-is so
/// replay files stay compatible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestCategory {
    /// Full 30-day block (`30_DIAS`).
    Days30,
    /// 15-day block (`15_DIAS`).
    Days15,
    /// 10-day block (`10_DIAS`).
    Days10,
    /// Arbitrary 1-30 day span (`DESCONTO`); day count supplied explicitly.
    Discount,
}

impl RequestCategory {
    /// Fixed day count for block categories; `None` for `Discount`.
    pub fn fixed_days(&self) -> Option<u32> {
        match self {
            RequestCategory::Days30 => Some(30),
            RequestCategory::Days15 => Some(15),
            RequestCategory::Days10 => Some(10),
            RequestCategory::Discount => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestCategory::Days30 => "30_DIAS",
            RequestCategory::Days15 => "15_DIAS",
            RequestCategory::Days10 => "10_DIAS",
            RequestCategory::Discount => "DESCONTO",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "30_DIAS" => Some(RequestCategory::Days30),
            "15_DIAS" => Some(RequestCategory::Days15),
            "10_DIAS" => Some(RequestCategory::Days10),
            "DESCONTO" => Some(RequestCategory::Discount),
            _ => None,
        }
    }
}

/// Workflow status of a leave request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Requested,
    ApprovedBySupervisor,
    ApprovedByManager,
    Rejected,
    Amended,
    Cancelled,
}

impl RequestStatus {
    /// Valid state-machine edges. Terminal states have no outgoing edges.
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (self, next),
            (Requested, ApprovedBySupervisor)
                | (Requested, Rejected)
                | (Requested, Cancelled)
                | (ApprovedBySupervisor, ApprovedByManager)
                | (ApprovedBySupervisor, Rejected)
                | (ApprovedBySupervisor, Amended)
        )
    }

    /// States that restore the debited days to the funding period.
    pub fn credits_back(&self) -> bool {
        matches!(self, RequestStatus::Rejected | RequestStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Requested => "requested",
            RequestStatus::ApprovedBySupervisor => "approved_supervisor",
            RequestStatus::ApprovedByManager => "approved_manager",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Amended => "amended",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "requested" => Some(RequestStatus::Requested),
            "approved_supervisor" => Some(RequestStatus::ApprovedBySupervisor),
            "approved_manager" => Some(RequestStatus::ApprovedByManager),
            "rejected" => Some(RequestStatus::Rejected),
            "amended" => Some(RequestStatus::Amended),
            "cancelled" => Some(RequestStatus::Cancelled),
            _ => None,
        }
    }
}

/// A single consumption event against exactly one acquisitive period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveRequest {
    pub id: RequestId,
    pub subject_id: SubjectId,
    /// The period this request debited.
    pub period_id: PeriodId,
    pub start_date: NaiveDate,
    /// `start_date + days_requested - 1`.
    pub end_date: NaiveDate,
    pub days_requested: u32,
    pub category: RequestCategory,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    /// Free text, set only on transition to `Rejected`.
    pub rejection_reason: Option<String>,
}

/// An operation fed to the ledger, the possible inputs of the replay loop.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Accrual: create a period with a fresh 30-day grant.
    Grant {
        subject: SubjectId,
        reference_year: i32,
        period_start: NaiveDate,
        period_end: NaiveDate,
    },
    /// Adjudicate a new leave request.
    Submit {
        subject: SubjectId,
        category: RequestCategory,
        start_date: NaiveDate,
        explicit_days: Option<u32>,
    },
    /// Workflow status change; rejection/cancellation re-credits the period.
    Transition {
        request: RequestId,
        status: RequestStatus,
        reason: Option<String>,
    },
}
