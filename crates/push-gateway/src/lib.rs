//! # Push Gateway
//!
//! HTTP surfaces around the [`event_broker::Broker`].
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        Push Gateway                           │
//! ├───────────────────────────────────────────────────────────────┤
//! │  Stream :8090 (public)          │  Admin :8091 (localhost)    │
//! │  GET /events  (SSE)             │  GET    /health             │
//! │  OPTIONS /events                │  GET    /metrics            │
//! │  GET /health                    │  GET    /api/v1/stats       │
//! │                                 │  GET    /api/v1/clients     │
//! │                                 │  DELETE /api/v1/clients/:id │
//! │                                 │  GET    /api/v1/history     │
//! │                                 │  POST   /api/v1/events      │
//! ├───────────────────────────────────────────────────────────────┤
//! │  Middleware: CORS → Tracing → RateLimit (/events only)        │
//! ├───────────────────────────────────────────────────────────────┤
//! │  Ingestion: IngestSource → translate → Broker::publish_event  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire format
//!
//! Each event is one SSE frame whose `data` is the JSON-encoded event:
//!
//! ```text
//! id: 7f0c...
//! event: blog.post.created
//! data: {"id":"7f0c...","type":"blog.post.created","source":"blog",...}
//!
//! ```

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod admin;
pub mod domain;
pub mod ingest;
pub mod middleware;
pub mod router;
pub mod service;
pub mod sse;

pub use domain::{ApiError, ConfigError, GatewayConfig, GatewayError};
pub use ingest::{run_ingest, translate, ChannelIngestSource, IngestError, IngestMessage, IngestSource};
pub use router::{admin_router, stream_router, AppState};
pub use service::{BoundAddrs, PushGatewayService};
