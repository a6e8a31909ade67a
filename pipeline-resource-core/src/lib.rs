#![doc = "pipeline-resource-core: fetch, aggregate and persist pipeline configs."]

//! This crate holds everything the `in` and `out` directions of the pipeline
//! resource do, independent of how the remote service, the `fly` tool or the
//! filesystem are reached.
//!
//! # Layout
//! - [`fetch`]: concurrent, order-preserving, all-or-nothing config fetching
//! - [`aggregate`]: outcomes to files, or outcomes to a content fingerprint
//! - [`persist`]: writing files through [`contract::Storage`], emitting versions
//! - [`in_command`] / [`out_command`]: the two directions wired end to end
//! - [`contract`]: collaborator traits, with `mockall` mocks for tests

pub mod aggregate;
pub mod contract;
pub mod error;
pub mod fetch;
pub mod in_command;
pub mod model;
pub mod out_command;
pub mod persist;

pub use error::{BoxError, Error, Result};
