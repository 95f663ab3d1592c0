//! Request middleware and extractors

pub mod auth;
pub mod metrics;

pub use auth::AuthUser;
