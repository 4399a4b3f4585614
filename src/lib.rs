//! Neural Core - project health pipeline
//!
//! Watches a project tree, runs its test suite when relevant files change
//! (at most one run at a time), scores overall health into a single
//! illumination value with six region statuses, and tracks regressions
//! against a bounded history of prior snapshots.

pub mod app;
pub mod config;
pub mod coordinator;
pub mod models;
pub mod publisher;
pub mod regression;
pub mod runner;
pub mod scoring;
pub mod store;
pub mod watcher;
