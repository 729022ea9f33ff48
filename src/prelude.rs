// Common Traits and Structs
pub use crate::common::mapping::{MappingTable, StreamMapping};
pub use crate::common::model::{
    CallId, CallReport, CallRequest, Config, DedupKey, DestinationArea, DispatchConfig,
    DispatchOutcome, GrantedEvent, GrantedNotification, HandleDecision, Modality, OutcomeKind,
    PositionUpdate, RiderKey, SkipReason,
};

// Engine
pub use crate::engine::{DispatchCoordinator, LiftApi, PositionWait};

// Errors
pub use crate::errors::{BoxError, Error, ErrorKind, LiftApiError, Result};

// Utils
pub use crate::utils::logger::{LoggerConfig, init_logger};

pub mod engine {
    pub use crate::engine::AreaGate;
    pub use crate::engine::CallDeduplicator;
    pub use crate::engine::DispatchCoordinator;
    pub use crate::engine::DispatchQueue;
    pub use crate::engine::Identifiable;
    pub use crate::engine::LiftApi;
    pub use crate::engine::PositionWait;
}
pub mod errors {
    pub use crate::errors::BoxError;
    pub use crate::errors::ConfigError;
    pub use crate::errors::Error;
    pub use crate::errors::ErrorKind;
    pub use crate::errors::LiftApiError;
    pub use crate::errors::QueueError;
    pub use crate::errors::Result;
}
