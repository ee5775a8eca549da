//! # Orchestrator
//!
//! Composes ingestion, batching and dispatch into one pipeline and
//! re-emits every dispatch outcome on the subscription tag.
//!
//! ```ignore
//! use orchestrator::Pipeline;
//!
//! let mut server = TcpPacketServer::bind(&config.subscription.listen_addr, 1024).await?;
//! let source = server.take_source().expect("fresh server");
//! let sink = server.sink();
//! let appender = AnyAppender::from_config(&config.destination)?;
//! let stats = Pipeline::new(config).run(source, sink, appender, shutdown).await?;
//! server.shutdown();
//! stats.print_summary();
//! ```

mod error;
mod outcome;
mod pipeline;
mod stats;

pub use error::{OutcomeError, PipelineError};
pub use outcome::{decode_outcome, encode_outcome, OutcomeMessage};
pub use pipeline::Pipeline;
pub use stats::PipelineStats;
