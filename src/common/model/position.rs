use crate::errors::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Moving direction of a lift deck, or the collective direction of the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
    #[default]
    None,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MovingState {
    Stopped,
    #[default]
    Standing,
    Starting,
    Moving,
    Decelerating,
    #[serde(other)]
    Unknown,
}

/// Progress signal pushed by the lift controller for an in-flight call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PositionUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    /// Deck direction.
    #[serde(default)]
    pub dir: Direction,
    /// Collective direction.
    #[serde(default)]
    pub coll: Direction,
    #[serde(default)]
    pub moving_state: MovingState,
    #[serde(default)]
    pub area: i32,
    /// Current floor.
    #[serde(default)]
    pub cur: i32,
    /// Advertised floor.
    #[serde(default)]
    pub adv: i32,
    /// Door open.
    #[serde(default)]
    pub door: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PositionPayload {
    Envelope { data: PositionUpdate },
    Bare(PositionUpdate),
}

impl PositionUpdate {
    /// Parses a lift-position message, either `{"data": {...}}` or the bare data object.
    pub fn from_json(message: &str) -> Result<Self> {
        let payload: PositionPayload = serde_json::from_str(message)?;
        Ok(match payload {
            PositionPayload::Envelope { data } => data,
            PositionPayload::Bare(data) => data,
        })
    }

    pub fn is_moving(&self) -> bool {
        matches!(
            self.moving_state,
            MovingState::Starting | MovingState::Moving | MovingState::Decelerating
        )
    }

    /// Deck is standing at `area` with the door open.
    pub fn is_open_at(&self, area: i32) -> bool {
        self.door && !self.is_moving() && self.area == area
    }
}
