//! Domain types - core business entities
//!
//! This module contains the canonical domain types used throughout the application.
//! These types are independent of persistence and of the watcher internals.

pub mod config;
pub mod record;
pub mod scan;
