//! Event plumbing between the platform channel and the GATT API.
//!
//! Everything here is independent of BLE: a broadcast bus, a replaying
//! single-value cache, a closable result queue, a per-key exclusion guard and
//! the request/response correlator built on top of the bus.

pub mod bus;
pub(crate) mod correlator;
pub mod guard;
pub mod latest;
pub mod queue;

pub use bus::{EventBus, Subscription};
pub use guard::KeyedMutex;
pub use latest::LatestValue;
pub use queue::ResultQueue;
