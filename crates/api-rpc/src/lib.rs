//! JSON-RPC API Layer
//!
//! Implements the JSON-RPC 2.0 server for the Bulkops daemon.

pub mod error;
pub mod handler;
pub mod rate_limiter;
pub mod server;
pub mod types;

pub use handler::{RateLimitConfig, RpcHandler};
pub use server::{RpcServer, RpcServerConfig};
