//! Central discovery directory client for toolbridge.
//!
//! Implements the `DirectoryApi` and `PackageResolver` ports over the
//! directory's HTTP API, with an injectable backend for testing.

mod client;
mod http;
mod resolver;

pub use client::{DEFAULT_DIRECTORY_URL, DirectoryClient, DirectoryConfig};
pub use http::{HttpBackend, ReqwestBackend};
pub use resolver::DirectoryResolver;
