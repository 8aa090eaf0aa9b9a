//! # Invoicing Library
//!
//! Multi-tenant invoicing data layer: typed, tenant-scoped delegates over
//! SeaORM entities, plus the axum API, authentication and configuration the
//! `invoicing` binary is built from.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod password;
pub mod query;
pub mod repositories;
pub mod seeds;
pub mod server;
pub mod services;
pub mod telemetry;
pub use migration;
