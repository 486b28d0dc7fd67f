//! taskdeck library
//!
//! This module exports the core components for testing and integration.

pub mod app;
pub mod cli;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod logging;
pub mod offline;
pub mod scheduler;
pub mod store;
pub mod types;
pub mod view;
pub mod web;
