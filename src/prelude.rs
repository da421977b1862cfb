pub use crate::base::{
    config::Config,
    error::ModerationError,
    types::{Err, Res, Void},
};
pub use anyhow::anyhow;
pub use tracing::{debug, error, info, instrument, warn};
