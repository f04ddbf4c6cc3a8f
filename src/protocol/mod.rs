//! Protocol module describing the platform channel.
//!
//! This module contains:
//! - method names for outbound invocations and inbound events
//! - the serde payload shapes exchanged with the platform adapter

pub mod messages;
pub mod methods;

pub use messages::GattAddress;
