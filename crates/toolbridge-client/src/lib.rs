//! Downstream tool-server clients for toolbridge.
//!
//! Three concerns live here, layered bottom-up:
//!
//! - protocol plumbing: JSON-RPC framing (`rpc`), SSE framing (`sse`)
//! - connections: stdio to launched servers (`stdio`), streamable HTTP
//!   with SSE fallback to remote endpoints (`http`)
//! - the shared `ConnectionCache` and the never-throwing `ToolInvoker`

pub(crate) mod rpc;
pub(crate) mod sse;

mod cache;
mod http;
mod invoker;
mod stdio;

pub use cache::ConnectionCache;
pub use http::{
    FallbackConnector, RemoteConnector, SseConnector, StreamableHttpConnector,
};
pub use invoker::{InvokeRequest, ToolInvoker};
pub use stdio::{StdioConnection, StdioConnector};
