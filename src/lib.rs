#![doc = "The `taskguard` library crate."]
#![doc = ""]
#![doc = "Session tokens and per-client rate limiting for an HTTP API: account registration,"]
#![doc = "password-to-token exchange, bearer authentication, revocation and a fixed-window"]
#![doc = "request budget shared through a counter store. The binary (`main.rs`) wires these"]
#![doc = "pieces into an actix-web server."]

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod ratelimit;
pub mod routes;
pub mod store;

pub use crate::config::Config;
pub use crate::error::AppError;
