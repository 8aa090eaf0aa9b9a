//! Database seeding functionality
//!
//! Populates a fresh database with a demo tenant so the API can be explored
//! right after `invoicing migrate`.

pub mod demo;

pub use demo::{DEMO_ADMIN_EMAIL, DEMO_ADMIN_PASSWORD, DemoSeed, seed_demo};
