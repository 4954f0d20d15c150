//! Request/response plumbing between nodes, and the iterative lookup engine.

pub mod config;
pub mod iterative_query;
mod memory;
mod socket;

use std::fmt::Debug;
use std::net::SocketAddr;
use std::sync::Weak;
use std::time::Duration;

use async_trait::async_trait;

use crate::common::{Request, Response};
use crate::Result;

pub use config::Config;
pub use iterative_query::{IterativeQuery, LookupOutcome};
pub use memory::{MemoryNetwork, MemoryTransport};
pub use socket::UdpTransport;

/// Default timeout of a single request before the callee is deemed unreachable.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(1000);
/// Default duration a lookup round waits for its requests before moving on.
pub const DEFAULT_ROUND_TIMEOUT: Duration = Duration::from_millis(1500);
/// Number of concurrent requests per lookup round.
pub const ALPHA: usize = 3;

#[async_trait]
/// Serves incoming requests, implemented by the node.
pub trait RequestHandler: Send + Sync {
    async fn handle_request(&self, request: Request) -> Response;
}

#[async_trait]
/// Carries requests to remote nodes and delivers incoming requests to a [RequestHandler].
pub trait Transport: Debug + Send + Sync + 'static {
    /// Address other nodes reach this transport at.
    fn local_addr(&self) -> SocketAddr;

    /// Start delivering incoming requests to `handler`.
    ///
    /// The handler is held weakly, requests arriving after it is dropped go unanswered.
    fn serve(&self, handler: Weak<dyn RequestHandler>);

    /// Send a request and wait for the matching response.
    ///
    /// Timeouts are the caller's concern, see [Config::request_timeout].
    async fn request(&self, to: SocketAddr, request: Request) -> Result<Response>;
}
