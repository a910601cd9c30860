pub mod config;
pub mod error;
pub mod types;

pub use error::{EphemError, EphemResult};
pub use types::{ServerStatus, ShareConstraints};
