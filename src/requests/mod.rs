//! Loan-application lifecycle: creation, underwriting, cancellation.

pub mod model;
pub mod service;

pub use model::{
    ApprovalData, CancelPayload, CreateRequestPayload, LoanApplication, RequestDetail,
    UpdateRequestPayload,
};
pub use service::{validate_approval_data, RequestService};
