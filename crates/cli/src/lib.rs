//! Command-line host for rollcache build nodes

pub mod cmd;
pub mod config;
pub mod report;
