//! Core types and shared functionality for raphael-sw.
//!
//! This crate provides:
//! - Request/response value types shared by the router and the cache
//! - The `CacheStorage` capability with SQLite and in-memory backends
//! - The fixed worker manifest (generation, precache list, bypass domains)
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod manifest;

pub use cache::{CacheDb, CacheStorage, MemoryCache};
pub use config::AppConfig;
pub use error::Error;
pub use http::{Destination, Method, Request, RequestMode, Response, ResponseType};
pub use manifest::WorkerManifest;
