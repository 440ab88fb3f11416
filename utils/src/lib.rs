//! Shared utilities for the Drift wallet core.

pub mod ids;
pub mod logging;
pub mod time;

pub use ids::random_id;
pub use logging::init_tracing;
pub use time::format_duration;
