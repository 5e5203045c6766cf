//! Broker errors.
//!
//! Only admission and lifecycle failures are errors. Backpressure drops are
//! counted and logged, never returned.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The registry already holds `max` clients.
    #[error("Client limit reached (max {max})")]
    ClientLimitReached { max: usize },

    /// The broker is not accepting work (not started, stopping or stopped).
    #[error("Broker is not running")]
    NotRunning,

    /// A client with this id is already registered.
    #[error("Client {id} is already registered")]
    DuplicateClient { id: String },

    /// `start()` was called on a broker that was already started.
    #[error("Broker already started")]
    AlreadyStarted,
}
