//! liftgate: landing-call dispatch for granted riders.
//! Modules live under `src/` with their own `lib.rs` entry points.

pub mod prelude;

#[path = "common/lib.rs"]
pub mod common;
#[path = "engine/lib.rs"]
pub mod engine;
#[path = "errors/lib.rs"]
pub mod errors;
#[path = "utils/lib.rs"]
pub mod utils;
