pub mod call;
pub mod config;
pub mod event;
pub mod outcome;
pub mod position;

pub use call::{CallId, CallRequest, DedupKey, DestinationArea, RiderKey};
pub use config::{Config, DispatchConfig, LoggerSettings};
pub use event::{GrantedEvent, GrantedNotification, Modality};
pub use outcome::{CallReport, DispatchOutcome, HandleDecision, OutcomeKind, SkipReason, WaitReport};
pub use position::{Direction, MovingState, PositionUpdate};
