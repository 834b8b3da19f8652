//! Fresh Ticker - a live-refreshing market ticker strip
//!
//! This crate keeps a row of market indicators up to date from a remote table,
//! falls back to a fixed set when the table is unavailable, and serves the
//! strip as server-rendered HTML.

pub mod config;
pub mod db;
pub mod display;
pub mod routes;
pub mod scheduler;
pub mod source;
pub mod ticker;
pub mod widget;
