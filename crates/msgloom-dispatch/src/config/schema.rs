use msgloom_core::error::{MsgLoomError, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    pub version: u32,

    #[serde(default)]
    pub pump: PumpSection,

    #[serde(default)]
    pub backlog: BacklogSection,
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(MsgLoomError::Config(format!(
                "unsupported config version: {}",
                self.version
            )));
        }
        self.pump.validate()?;
        self.backlog.validate()?;
        Ok(())
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            version: 1,
            pump: PumpSection::default(),
            backlog: BacklogSection::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PumpSection {
    /// Per-`pump()` envelope cap; 0 means drain until empty.
    #[serde(default = "default_pump_limit")]
    pub default_limit: usize,
}

impl Default for PumpSection {
    fn default() -> Self {
        Self {
            default_limit: default_pump_limit(),
        }
    }
}

impl PumpSection {
    pub fn validate(&self) -> Result<()> {
        if self.default_limit > 10_000 {
            return Err(MsgLoomError::Config(
                "pump.default_limit must be at most 10000".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BacklogSection {
    /// Capacity of each accumulate-policy backlog; oldest entries are
    /// evicted past this point.
    #[serde(default = "default_accumulate_cap")]
    pub accumulate_cap: usize,
}

impl Default for BacklogSection {
    fn default() -> Self {
        Self {
            accumulate_cap: default_accumulate_cap(),
        }
    }
}

impl BacklogSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=4096).contains(&self.accumulate_cap) {
            return Err(MsgLoomError::Config(
                "backlog.accumulate_cap must be between 1 and 4096".into(),
            ));
        }
        Ok(())
    }
}

fn default_pump_limit() -> usize {
    0
}
fn default_accumulate_cap() -> usize {
    64
}
