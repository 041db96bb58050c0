//! AI infrastructure: routing, resilience and transport for the TARX backends.

pub mod circuit_breaker;
pub mod client;
pub mod config;
pub mod health;
pub mod message;
pub mod retry;
pub mod routing;
pub mod transport;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSnapshot, CircuitState};
pub use client::{ApiStream, TarxMeshClient};
pub use config::TarxClientConfig;
pub use health::{BackendKind, ConnectivityStatus};
pub use message::build_message_array;
pub use retry::{RetryPolicy, Retrying};
pub use routing::{MeshHealthProbe, RoutingContext, RoutingDecisionEngine};
pub use transport::HttpTransport;
