//! Shared domain models, configuration, and stream mappings.
//!
//! Everything the dispatch engine exchanges with its collaborators lives here:
//! call requests and outcomes, lift position updates, granted notifications,
//! and the serde configuration model.

pub mod mapping;
pub mod model;
