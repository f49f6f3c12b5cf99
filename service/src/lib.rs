#![deny(
    clippy::expect_used,
    clippy::panic,
    clippy::print_stdout,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used
)]

pub mod analytics;
pub mod auth;
pub mod config;
pub mod db;
pub mod geo;
pub mod graph;
pub mod http;
pub mod models;
pub mod repo;
pub mod secrets;
pub mod session;
pub mod telemetry;
pub mod validator;
