//! Dispatch config loader (strict parsing).

pub mod schema;

use std::fs;

use msgloom_core::error::{MsgLoomError, Result};

pub use schema::{BacklogSection, DispatchConfig, PumpSection};

pub fn load_from_file(path: &str) -> Result<DispatchConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| MsgLoomError::Config(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<DispatchConfig> {
    let cfg: DispatchConfig = serde_yaml::from_str(s)
        .map_err(|e| MsgLoomError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
