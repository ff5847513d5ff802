//! Route definitions for the LendFlow API

mod auth;
mod funding;
mod loans;
mod meta;
mod requests;
mod users;

pub use auth::auth_routes;
pub use funding::funding_routes;
pub use loans::loan_routes;
pub use meta::meta_routes;
pub use requests::request_routes;
pub use users::user_routes;
