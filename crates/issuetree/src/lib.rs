//! issuetree - issue graph traversal and status roll-up.
//!
//! This crate models issues fetched from an issue tracker as a graph and
//! answers questions about it: what lies below an issue, what lies above
//! it, and how healthy the work below it is. Records are fetched through a
//! [`tracker::TrackerClient`] and memoized in an explicit
//! [`cache::IssueCache`].

#![forbid(unsafe_code)]

// Public modules for library usage
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod issue;
pub mod report;
pub mod rollup;
pub mod tracker;
pub mod traversal;

// CLI support (needed by the binary)
pub mod app;
pub mod cli;
pub mod output;

pub use error::{Error, Result};
pub use issue::{Issue, Tracker};
