// TARX Core Library - adaptive local/mesh inference client
// Two layers: Util -> Infrastructure

pub mod infrastructure; // Infrastructure layer - routing, circuit breaker, transport, client
pub mod util; // Utility layer - errors

pub use util::errors::*;

pub use infrastructure::ai::{
    ApiStream, BackendKind, CircuitBreaker, CircuitBreakerConfig, CircuitState, ConnectivityStatus,
    RetryPolicy, RoutingContext, TarxClientConfig, TarxMeshClient,
};

pub use tarx_ai_adapters::StreamEvent;
pub use tarx_core_types::{ContentPart, ConversationTurn, Message, MessageContent, MessageRole};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
