//! Fear core: FUD scoring, the weighted fear index, whale flow analysis,
//! campaign grouping and fear anomaly checks for crypto news and on-chain data.
//! Pure computation; fetching and transport stay with the caller.

pub mod anomaly;
pub mod cache;
pub mod campaign;
pub mod config;
pub mod error;
pub mod fear;
pub mod fud;
pub mod models;
pub mod service;
pub mod trend;
pub mod whale;

pub use anomaly::{
    generate_fear_alert, is_anomalous_fear_level, FearAlert, FearAnomaly, FearHistory,
};
pub use cache::{cache_key, MemoryCache, ResultCache};
pub use campaign::{identify_campaigns, Campaign};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult, ErrorBody};
pub use fear::{build_meter, investment_action};
pub use fud::{filter_by_level, FudScorer};
pub use models::{
    Article, CryptoHolder, FearComponents, FearMeterResult, FudAnalysis, FudLevel, FudScore,
    VcPosition, WhaleTransaction,
};
pub use service::{Engine, Request};
pub use trend::Trend;
pub use whale::{analyze_pressure, concentration_risk, detect_unusual_activity, FlowClassifier};
