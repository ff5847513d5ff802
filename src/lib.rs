//! LendFlow backend library
//!
//! Core modules for the peer-to-peer lending marketplace server.

pub mod amortization;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod funding;
pub mod handlers;
pub mod loans;
pub mod middleware;
pub mod models;
pub mod rates;
pub mod requests;
pub mod routes;
pub mod state;
pub mod users;
