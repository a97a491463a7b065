pub mod auth;
pub mod cloudpcs;
pub mod system;
pub mod users;
