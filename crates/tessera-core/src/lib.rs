//! # Tessera Core
//!
//! In-memory record model for the Tessera container format.
//!
//! A Tessera stream is a sequence of self-contained events. Each [`Event`]
//! holds any number of typed payloads ("entries"), a local table mapping small
//! type IDs to payload type names, and a tag index grouping entries by name.
//! Nothing about the payload types needs to be known when a stream is created:
//! every event carries its own type table.
//!
//! ## Key Types
//!
//! - [`Event`]: entries, type table and tags, with lazy decode-on-access
//! - [`Payload`] / [`NamedPayload`]: what an entry value must provide
//! - [`PayloadRegistry`]: type name -> decode factory, shared by events
//! - [`EventBlock`]: the persisted form of an event
//!
//! ## Example
//!
//! ```rust,ignore
//! use tessera_core::{Event, PayloadRegistry, generic_payload};
//!
//! PayloadRegistry::global().register::<SimTrackerHit>()?;
//!
//! let mut event = Event::new();
//! let id = event.add_entry(SimTrackerHit { edep: 0.3, pos: [0.0; 3] }, &["TrackerHits"]);
//! assert_eq!(event.tagged_entries("TrackerHits"), &[id]);
//! ```

pub mod block;
pub mod error;
pub mod event;
pub mod payload;
pub mod registry;

// Re-exports
pub use block::{EntryRecord, EventBlock};
pub use error::{EventError, PayloadError, Result};
pub use event::Event;
pub use payload::{Encoding, NamedPayload, Payload, SelfDescribing};
pub use registry::{DecodeFn, PayloadKind, PayloadRegistry};
