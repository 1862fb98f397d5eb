//! Session orchestration over the Bloomberg API transport.
//!
//! A [`Session`] multiplexes many logically independent operations (service
//! opens, requests, subscriptions) over the single event stream of one
//! transport instance:
//!
//! - Every operation gets a correlation id and is routed back by it
//! - Service opens are shared by all callers of the same URI
//! - Requests deliver partial and final responses through one callback
//! - Subscriptions emit data on their own [`SubscriptionEvents`] stream
//! - Termination fails everything still pending, exactly once
//!
//! # Example
//!
//! ```ignore
//! use blpapi::{Session, SessionOptions, Subscription, SubscriptionEvent};
//!
//! let session = Session::connect(SessionOptions::default(), &connector)?;
//! session.start().await?;
//!
//! let (ibm, mut events) = Subscription::new("IBM US Equity", ["LAST_PRICE"], None);
//! session.subscribe(&[ibm.clone()], ()).await?;
//! while let Some(SubscriptionEvent::Data { data, .. }) = events.recv().await {
//!     println!("{data}");
//! }
//! ```

pub mod completion;
pub mod events;
pub mod options;
pub mod session;
pub mod subscription;

pub use blpapi_protocol as protocol;
pub use blpapi_protocol::{
	CorrelationId, Identity, SessionOptions, SubscriptionRecord, TransportEvent,
};
pub use blpapi_runtime as runtime;
pub use blpapi_runtime::{
	Connector, Error, Result, Transport, TransportError, TransportParts, TransportResult,
};
pub use events::SessionEvent;
pub use options::CallOptions;
pub use session::{Lifecycle, Response, Session, SessionStats};
pub use subscription::{Subscription, SubscriptionEvent, SubscriptionEvents};
