//! # Dispatcher
//!
//! Batch dispatch to the destination log service.
//!
//! Responsibilities:
//! - Consume closed `Batch`es in order
//! - Write them through a `LogAppender` (HTTP proxy, TCP log protocol, tracing)
//! - Bounded retry with exponential backoff, circuit breaker
//! - Exactly one `DispatchOutcome` per batch

pub mod appenders;
pub mod breaker;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod protocol;
pub mod retry;

pub use appenders::{AnyAppender, HttpAppender, TcpAppender, TracingAppender};
pub use breaker::{BreakerState, CircuitBreaker};
pub use contracts::{Batch, DispatchOutcome, LogAppender};
pub use dispatcher::Dispatcher;
pub use error::DispatcherError;
pub use handle::DispatcherHandle;
pub use metrics::{DispatcherMetrics, DispatcherSnapshot};
pub use protocol::{AppendRequest, AppendResponse, ProtocolError};
pub use retry::RetryPolicy;
