//! blpapi Runtime - transport boundary, correlation, and event routing
//!
//! This crate provides the low-level infrastructure the session engine is
//! built on:
//!
//! - **Transport**: The call surface and event stream of the native binding
//! - **Errors**: The error taxonomy and translation of tagged transport failures
//! - **Correlation**: Allocation of correlation ids
//! - **Demultiplexing**: Routing of shared named events to per-operation handlers
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │    blpapi    │  Session, requests, subscriptions
//! └──────┬───────┘
//!        │ owns Correlator + EventDemux, calls Transport
//! ┌──────▼───────┐
//! │blpapi-runtime│  This crate
//! │  ┌────────┐  │
//! │  │ Demux  │  │  (event name, correlation id) -> handler
//! │  └────────┘  │
//! │  ┌────────┐  │
//! │  │ Trans  │  │  Native binding boundary
//! │  └────────┘  │
//! └──────────────┘
//! ```

pub mod config;
pub mod correlation;
pub mod demux;
pub mod error;
pub mod transport;

// Re-export key types at crate root
pub use config::load_options;
pub use correlation::Correlator;
pub use demux::{EventDemux, Handler};
pub use error::{Error, Result, translate};
pub use transport::{Connector, Transport, TransportError, TransportParts, TransportResult};
