//! Infrastructure: persistence, HTTP surface, auth, telemetry.

pub mod auth;
pub mod db;
pub mod error;
pub mod http;
pub mod telemetry;
