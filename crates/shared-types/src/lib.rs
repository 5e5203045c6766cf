//! # Shared Types Crate
//!
//! The event data model used by every crate in the workspace.
//!
//! ## Design Principles
//!
//! - **Immutable Events**: An [`Event`] is never mutated after it is published;
//!   the broker shares it between history and subscribers behind an `Arc`.
//! - **Pure Matching**: [`SubscriptionFilter::matches`] has no side effects and
//!   is safe to call from the dispatch task while holding the registry lock.
//! - **Transport Independence**: nothing here knows about HTTP or SSE.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod duration_serde;
pub mod event;
pub mod filter;
pub mod metadata;

pub use event::{Event, EventData, BROKER_SOURCE, CONNECTION_ESTABLISHED_TYPE, HEARTBEAT_TYPE};
pub use filter::SubscriptionFilter;
pub use metadata::ClientMetadata;

/// Generate a fresh opaque identifier (UUIDv4, hyphenated).
#[must_use]
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
