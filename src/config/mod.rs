// src/config/mod.rs
pub mod settings;

pub use settings::{ChainEndpoints, Config};

use crate::error::Result;
use std::sync::Arc;

/// Loads `.env` (if present), reads the environment and validates the result.
pub fn load_config() -> Result<Arc<Config>> {
    dotenv::dotenv().ok();

    let config = Config::from_env();
    config.validate()?;
    config.validate_and_log();

    Ok(Arc::new(config))
}
