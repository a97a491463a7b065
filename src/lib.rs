//! nimbus: management backend for simulated cloud-PC workspaces.
//!
//! User accounts and cloud-PC records live in Postgres; reads go through a
//! Redis-backed cache with per-category TTL policies and event-driven
//! invalidation. Lifecycle transitions are simulated by cancellable timers,
//! and a WebSocket channel drives a deterministic fake terminal per
//! connection.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod ws;
