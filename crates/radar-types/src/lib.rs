//! Shared conversation types, the model-provider seam and the error
//! hierarchy for radar.

pub mod error;
pub mod message;
pub mod provider;
pub mod util;

pub use error::{ApiError, ConfigError, RadarError};
pub use message::*;
pub use util::preview;
