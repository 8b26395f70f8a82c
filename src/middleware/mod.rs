pub mod auth;
pub mod cache;
pub mod ownership;
pub mod rate_limit;
pub mod roles;
