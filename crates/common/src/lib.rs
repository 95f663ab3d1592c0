//! ScoutDeck Common Library
//!
//! Shared code for the ScoutDeck client tools and reference backend:
//! - Report, team and user models
//! - Completion estimator and report overview
//! - Report lifecycle (editor, save / mark-complete transitions)
//! - Session store and REST API client
//! - Notification polling
//! - Error types, configuration and metrics

pub mod auth;
pub mod client;
pub mod completion;
pub mod config;
pub mod errors;
pub mod lifecycle;
pub mod metrics;
pub mod models;
pub mod overview;
pub mod polling;

// Re-export commonly used types
pub use auth::{Session, SessionStore};
pub use client::{ApiClient, ReportsApi};
pub use completion::{calculate_completion, CompletionBucket};
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use lifecycle::{ReportEditor, SaveFailure};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
