//! Funded loans: installment processing, pro-rata distribution, payoff.

pub mod model;
pub mod service;

pub use model::{InstallmentReceipt, Investment, InvestorShare};
pub use service::LoanService;
