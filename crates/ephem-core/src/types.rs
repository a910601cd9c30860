use serde::{Deserialize, Serialize};

/// Limits advertised by the relay via its status endpoint.
///
/// The relay enforces these server-side; the client checks them up front so
/// a doomed request fails before any encryption work runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStatus {
    pub version: String,
    /// Maximum accepted envelope size in bytes
    pub max_size: u64,
    /// Maximum allowed view count
    pub max_views: u32,
    /// Maximum allowed expiration in minutes
    pub max_expiration: u32,
}

/// What the sender asked for: how many views and how long the note lives.
///
/// Both are requests, not guarantees — enforcement is the relay's job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareConstraints {
    pub views: Option<u32>,
    pub expire_minutes: Option<u32>,
}

impl ShareConstraints {
    pub fn new(views: Option<u32>, expire_minutes: Option<u32>) -> Self {
        Self {
            views,
            expire_minutes,
        }
    }
}
