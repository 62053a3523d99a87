pub mod csv;
pub mod ledger;
pub mod model;

pub use ledger::{InputError, Ledger, NotFoundError, RequestError, StorageError};
pub use model::{
    AcquisitivePeriod, LeaveRequest, Operation, PeriodId, RequestCategory, RequestId,
    RequestStatus, SubjectId,
};
