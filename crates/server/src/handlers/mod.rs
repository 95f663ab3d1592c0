//! API handlers module

pub mod activities;
pub mod auth;
pub mod health;
pub mod reports;
pub mod teams;
