use crate::common::model::{DestinationArea, PositionUpdate};
use crate::errors::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Action id of a landing call heading up.
pub const LANDING_CALL_UP_ACTION: u32 = 2001;
/// Action id of a landing call heading down.
pub const LANDING_CALL_DOWN_ACTION: u32 = 2002;

pub fn landing_call_action(direction_up: bool) -> u32 {
    if direction_up {
        LANDING_CALL_UP_ACTION
    } else {
        LANDING_CALL_DOWN_ACTION
    }
}

/// Upstream lift-control API driven by the position-wait protocol.
///
/// `place_landing_call` resolves `Ok(())` once the controller reports the call
/// served; any transport or protocol failure is an `Err`. Position updates for
/// the call are pushed into `updates` while it is in flight. A send error on
/// `updates` means the caller stopped listening and may be ignored.
///
/// Dropping the returned future cancels the call; implementations must not
/// rely on being polled to completion.
#[async_trait]
pub trait LiftApi: Send + Sync {
    async fn place_landing_call(
        &self,
        destination_area: DestinationArea,
        direction_up: bool,
        updates: mpsc::Sender<PositionUpdate>,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landing_call_actions_follow_direction() {
        assert_eq!(landing_call_action(true), 2001);
        assert_eq!(landing_call_action(false), 2002);
    }
}
