//! User accounts: registration, authentication, and the balance ledger.

pub mod model;
pub mod service;

pub use model::{BalanceChangeRequest, LoginRequest, RegisterRequest, TokenResponse};
pub use service::UserService;
