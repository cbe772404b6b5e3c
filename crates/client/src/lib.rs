//! Client code for raphael-sw.
//!
//! This crate provides the network side of the worker: the `Network` seam,
//! the reqwest-backed implementation, and URL resolution against the worker
//! scope.

pub mod fetch;

pub use fetch::{FetchConfig, HttpNetwork, Network, UrlError, canonicalize, resolve, same_origin};
