//! Engine tunables. Every field has a default so a partial JSON file works.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::anomaly::{DEFAULT_SIGMA, HISTORY_CAPACITY};
use crate::campaign::MIN_CAMPAIGN_SIZE;
use crate::error::{EngineError, EngineResult};
use crate::fud::DEFAULT_KEYWORD_LIMIT;
use crate::whale::{
    ConcentrationMode, CONCENTRATION_TOP_N, DISPLAY_UNUSUAL_THRESHOLD_USD, UNUSUAL_THRESHOLD_USD,
};

pub const CONFIG_ENV: &str = "FEAR_ENGINE_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub anomaly_sigma: f64,
    pub history_capacity: usize,
    pub campaign_min_size: usize,
    pub keyword_limit: usize,
    pub unusual_threshold_usd: f64,
    pub display_unusual_threshold_usd: f64,
    pub concentration_top_n: usize,
    pub concentration_mode: ConcentrationMode,
    pub parallel_scoring: bool,
    pub cache: CacheTtls,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheTtls {
    pub fear_secs: u64,
    pub whale_secs: u64,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            fear_secs: 180,
            whale_secs: 300,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            anomaly_sigma: DEFAULT_SIGMA,
            history_capacity: HISTORY_CAPACITY,
            campaign_min_size: MIN_CAMPAIGN_SIZE,
            keyword_limit: DEFAULT_KEYWORD_LIMIT,
            unusual_threshold_usd: UNUSUAL_THRESHOLD_USD,
            display_unusual_threshold_usd: DISPLAY_UNUSUAL_THRESHOLD_USD,
            concentration_top_n: CONCENTRATION_TOP_N,
            concentration_mode: ConcentrationMode::InputOrder,
            parallel_scoring: true,
            cache: CacheTtls::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(content: &str) -> EngineResult<Self> {
        serde_json::from_str(content).map_err(|e| EngineError::usage(format!("invalid config: {e}")))
    }

    /// Load from `path`. A missing file means defaults.
    pub fn load(path: &Path) -> EngineResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            EngineError::usage(format!("cannot read config {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
    }
}
