pub mod area_gate;
pub mod coordinator;
pub mod deduplication;
pub mod lift_api;
pub mod position_wait;
pub mod runner;

#[cfg(test)]
pub(crate) mod testing;

pub use area_gate::{AreaGate, AreaGuard};
pub use coordinator::DispatchCoordinator;
pub use deduplication::CallDeduplicator;
pub use lift_api::{LiftApi, landing_call_action};
pub use position_wait::PositionWait;
pub use runner::{DispatchQueue, Identifiable};
