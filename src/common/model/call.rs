use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque zone/floor identifier understood by the lift controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationArea(pub i32);

impl fmt::Display for DestinationArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for DestinationArea {
    fn from(value: i32) -> Self {
        DestinationArea(value)
    }
}

/// Identity used to suppress repeated calls for the same rider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiderKey(String);

impl RiderKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RiderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RiderKey {
    fn from(value: &str) -> Self {
        RiderKey::new(value)
    }
}

impl From<String> for RiderKey {
    fn from(value: String) -> Self {
        RiderKey(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(Uuid);

impl CallId {
    /// Time-ordered id, so log lines sort in submission order.
    pub fn generate() -> Self {
        CallId(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deduplication identity: one rider heading to one destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub rider_key: RiderKey,
    pub destination_area: DestinationArea,
}

impl DedupKey {
    pub fn new(rider_key: RiderKey, destination_area: DestinationArea) -> Self {
        Self {
            rider_key,
            destination_area,
        }
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.rider_key, self.destination_area)
    }
}

/// One attempt to move a rider. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRequest {
    pub call_id: CallId,
    pub rider_key: RiderKey,
    pub destination_area: DestinationArea,
    pub direction_up: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CallRequest {
    pub fn new(rider_key: RiderKey, destination_area: DestinationArea, direction_up: bool) -> Self {
        Self {
            call_id: CallId::generate(),
            rider_key,
            destination_area,
            direction_up,
            stream_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_stream_id(mut self, stream_id: impl Into<String>) -> Self {
        self.stream_id = Some(stream_id.into());
        self
    }

    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(self.rider_key.clone(), self.destination_area)
    }
}
