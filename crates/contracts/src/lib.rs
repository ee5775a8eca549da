//! # Contracts
//!
//! Frozen interface contracts shared by every stage of the bridge.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Data flow
//! `RawPacket` -> `SensorRecord` -> `Batch` -> `DispatchOutcome` -> `RawPacket`
//!
//! ## Time model
//! - Window deadlines use the monotonic clock (`Instant`)
//! - `SensorRecord::timestamp_millis` is producer wall-clock time and is never
//!   used for batching decisions

mod appender;
mod config;
mod error;
mod outcome;
mod packet;
mod record;
mod transport;

pub use appender::*;
pub use config::*;
pub use error::*;
pub use outcome::*;
pub use packet::*;
pub use record::*;
pub use transport::*;
