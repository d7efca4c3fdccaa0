//! Pack allocation service.
//!
//! Decides which whole packs to ship for an order and exposes that decision
//! over a small HTTP API.

pub mod allocator;
pub mod api;
pub mod config;
pub mod model;
