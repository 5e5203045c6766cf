//! Connection metadata captured when a subscriber is accepted.

use serde::{Deserialize, Serialize};

/// Where a subscriber connected from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMetadata {
    /// `User-Agent` request header, if any.
    pub user_agent: Option<String>,
    /// Remote address as seen by the gateway.
    pub remote_addr: Option<String>,
}

impl ClientMetadata {
    pub fn new(user_agent: Option<String>, remote_addr: Option<String>) -> Self {
        Self {
            user_agent,
            remote_addr,
        }
    }
}
