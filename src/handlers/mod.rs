//! API handlers for LendFlow

mod auth;
mod funding;
mod loans;
mod meta;
mod requests;
mod users;

pub use auth::*;
pub use funding::*;
pub use loans::*;
pub use meta::*;
pub use requests::*;
pub use users::*;
