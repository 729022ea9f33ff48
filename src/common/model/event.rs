use super::call::{DestinationArea, RiderKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Biometric or code modality that produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Modality {
    #[default]
    #[serde(alias = "Face")]
    Face,
    #[serde(alias = "Palm")]
    Palm,
    #[serde(alias = "OpticalCode")]
    OpticalCode,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Modality::Face => "face",
            Modality::Palm => "palm",
            Modality::OpticalCode => "optical_code",
            Modality::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Raw granted-access notification as delivered by the notification transport.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantedNotification {
    pub stream_id: String,
    #[serde(default)]
    pub watchlist_member_id: Option<String>,
    #[serde(default)]
    pub watchlist_member_external_id: Option<String>,
    #[serde(default)]
    pub watchlist_external_id: Option<String>,
    #[serde(default)]
    pub watchlist_id: Option<String>,
    #[serde(default)]
    pub match_result_score: Option<i64>,
    /// Face when the transport does not say.
    #[serde(default)]
    pub modality: Modality,
}

impl GrantedNotification {
    /// Member id, then member external id, then the stream id itself.
    pub fn rider_key(&self) -> RiderKey {
        let key = self
            .watchlist_member_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .or_else(|| {
                self.watchlist_member_external_id
                    .as_deref()
                    .filter(|id| !id.is_empty())
            })
            .unwrap_or(&self.stream_id);
        RiderKey::new(key)
    }
}

/// Typed event handed to the coordinator: one rider, one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantedEvent {
    pub stream_id: String,
    pub rider_key: RiderKey,
    pub destination_area: DestinationArea,
    pub direction_up: bool,
}

impl GrantedEvent {
    pub fn new(
        stream_id: impl Into<String>,
        rider_key: impl Into<RiderKey>,
        destination_area: impl Into<DestinationArea>,
        direction_up: bool,
    ) -> Self {
        Self {
            stream_id: stream_id.into(),
            rider_key: rider_key.into(),
            destination_area: destination_area.into(),
            direction_up,
        }
    }
}
