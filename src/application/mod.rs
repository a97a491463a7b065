//! Application services composing the record store, the cache, and the
//! transition scheduler.

pub mod auth;
pub mod cloudpcs;
pub mod error;
pub mod lifecycle;
pub mod platform;
pub mod repos;
pub mod stats;
pub mod users;

pub use error::AppError;
