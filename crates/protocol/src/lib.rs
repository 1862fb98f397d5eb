//! Wire types for the blpapi session engine.
//!
//! This crate contains the serde-serializable shapes exchanged with the
//! native transport, plus the static routing tables that tell the session
//! which events answer which operations.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! - **Pure data**: No behavior beyond serialization and table lookups
//! - **1:1 with the transport**: Field names match what the binding emits
//! - **Stable**: Changes only when the transport surface changes
//!
//! Session orchestration is built on top of these types in `blpapi`.

pub mod event;
pub mod options;
pub mod routing;
pub mod types;

pub use event::*;
pub use options::*;
pub use routing::*;
pub use types::*;
