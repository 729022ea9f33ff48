use crate::common::model::{DestinationArea, GrantedEvent, GrantedNotification, Modality};
use crate::errors::{MappingError, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a granted event on a camera stream should send the lift.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StreamMapping {
    pub stream_id: Uuid,
    pub destination_area: DestinationArea,
    #[serde(default = "default_direction_up")]
    pub direction_up: bool,
    /// Only members of these watchlists trigger a call. Empty means everyone.
    #[serde(default)]
    pub watchlist_external_ids: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_enabled")]
    pub face_enabled: bool,
    #[serde(default = "default_enabled")]
    pub palm_enabled: bool,
    #[serde(default = "default_enabled")]
    pub optical_code_enabled: bool,
}

fn default_direction_up() -> bool {
    true
}

fn default_enabled() -> bool {
    true
}

impl StreamMapping {
    pub fn new(stream_id: Uuid, destination_area: impl Into<DestinationArea>, direction_up: bool) -> Self {
        Self {
            stream_id,
            destination_area: destination_area.into(),
            direction_up,
            watchlist_external_ids: Vec::new(),
            enabled: true,
            face_enabled: true,
            palm_enabled: true,
            optical_code_enabled: true,
        }
    }

    pub fn with_watchlists(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.watchlist_external_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// A non-empty filter only passes notifications that name one of its watchlists.
    fn accepts_watchlist(&self, watchlist_external_id: Option<&str>) -> bool {
        if self.watchlist_external_ids.is_empty() {
            return true;
        }
        let accepted = match watchlist_external_id {
            Some(id) if !id.is_empty() => self.watchlist_external_ids.iter().any(|w| w == id),
            _ => false,
        };
        if !accepted {
            warn!(
                "Stream mapping {} -> {} does not apply to watchlist {:?}",
                self.stream_id, self.destination_area, watchlist_external_id
            );
        }
        accepted
    }

    fn accepts_modality(&self, modality: Modality) -> bool {
        let accepted = match modality {
            Modality::Face => self.face_enabled,
            Modality::Palm => self.palm_enabled,
            Modality::OpticalCode => self.optical_code_enabled,
            Modality::Unknown => false,
        };
        if !accepted {
            warn!(
                "Stream mapping {} -> {} does not apply to modality {}",
                self.stream_id, self.destination_area, modality
            );
        }
        accepted
    }
}

/// Resolves raw notifications into typed events.
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    mappings: Vec<StreamMapping>,
}

impl MappingTable {
    pub fn new(mappings: Vec<StreamMapping>) -> Self {
        Self { mappings }
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Strict lookup: malformed and unmapped streams are errors.
    pub fn try_resolve(&self, notification: &GrantedNotification) -> Result<Vec<GrantedEvent>> {
        let stream_id = Uuid::parse_str(&notification.stream_id)
            .map_err(|_| MappingError::InvalidStreamId(notification.stream_id.clone()))?;

        let per_stream: Vec<&StreamMapping> =
            self.mappings.iter().filter(|m| m.stream_id == stream_id).collect();
        if per_stream.is_empty() {
            return Err(MappingError::UnmappedStream(notification.stream_id.clone()).into());
        }

        let rider_key = notification.rider_key();
        let events = per_stream
            .into_iter()
            .filter(|m| m.enabled)
            .filter(|m| m.accepts_modality(notification.modality))
            .filter(|m| m.accepts_watchlist(notification.watchlist_external_id.as_deref()))
            .map(|m| GrantedEvent {
                stream_id: notification.stream_id.clone(),
                rider_key: rider_key.clone(),
                destination_area: m.destination_area,
                direction_up: m.direction_up,
            })
            .collect::<Vec<_>>();

        if events.is_empty() {
            debug!(
                "No relevant mappings remain for stream {}, watchlist {:?}, modality {}",
                notification.stream_id, notification.watchlist_external_id, notification.modality
            );
        }
        Ok(events)
    }

    /// Lenient lookup used on the hot path: lookup failures are logged and yield no events.
    pub fn resolve(&self, notification: &GrantedNotification) -> Vec<GrantedEvent> {
        match self.try_resolve(notification) {
            Ok(events) => events,
            Err(e) => {
                warn!("Ignoring granted notification: {}", e);
                Vec::new()
            }
        }
    }
}
