//! Investor funding: pledge accounting and full-funding conversion.

pub mod model;
pub mod service;

pub use model::{FundPayload, InvestorPosition, Pledge};
pub use service::{deadline_sweeper, FundingService};
