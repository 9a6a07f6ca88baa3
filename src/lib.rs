//! Eisenhower Board Library
//!
//! Projects sorted into the four urgent/important quadrants, each holding
//! tasks and one level of subtasks. This module exports the core components
//! for testing and integration.

pub mod api;
pub mod auth;
pub mod backoff;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod hierarchy;
pub mod moves;
pub mod progress;
pub mod sync;
pub mod types;
