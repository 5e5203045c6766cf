//! # Event Broker
//!
//! In-process fan-out of upstream domain events to many long-lived,
//! filterable subscriber connections, with a bounded replay window for
//! reconnecting clients.
//!
//! ```text
//!  upstream ──publish_event()──► [publish queue] ──► dispatch task
//!                                 (drop if full)        │
//!                                                       ├──► EventHistory.add
//!                                                       │
//!                                                       └──► Client.send_event ──► [client queue] ──► connection
//!                                                            (filter match,          (drop if full,
//!                                                             non-blocking)           this client only)
//! ```
//!
//! ## Backpressure
//!
//! Two independent drop points:
//!
//! - **Global**: the publish queue is full. The event reaches nobody.
//! - **Per client**: one client's queue is full. Only that client misses it.
//!
//! Neither blocks the caller and neither is reported back to the publisher.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod broker;
pub mod client;
pub mod config;
pub mod error;
pub mod history;

pub use broker::{Broker, BrokerState, BrokerStats};
pub use client::{Client, ClientQueue, ClientStats};
pub use config::BrokerConfig;
pub use error::BrokerError;
pub use history::EventHistory;
