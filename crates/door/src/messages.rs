use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A key presented at a door's reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeKey {
    /// The door the reader belongs to.
    pub id: Uuid,
    /// The presented key. The nil key is never valid.
    pub key: Uuid,
    /// How long the door may stay unlocked, and then open, before timing out.
    pub timeout: Duration,
    /// Invalid keys tolerated before the door raises an alert.
    pub intrusion_threshold: u32,
}

impl AuthorizeKey {
    pub fn new(id: Uuid, key: Uuid) -> Self {
        AuthorizeKey {
            id,
            key,
            timeout: Duration::from_secs(5),
            intrusion_threshold: 3,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_intrusion_threshold(mut self, threshold: u32) -> Self {
        self.intrusion_threshold = threshold;
        self
    }

    pub fn is_valid(&self) -> bool {
        !self.key.is_nil()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeKeyResponse {
    pub authorized: bool,
}

/// A door sensor report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorStatus {
    pub id: Uuid,
    pub is_open: bool,
    pub is_locked: bool,
}
