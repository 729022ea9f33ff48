pub mod error;

pub use error::{
    BoxError, ConfigError, Error, ErrorInner, ErrorKind, LiftApiError, MappingError, QueueError,
    Result,
};
