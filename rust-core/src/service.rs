//! Request boundary: turns JSON requests into engine calls and JSON results.
//!
//! Transport (HTTP, stdin) lives outside. Upstream fetchers hand their raw
//! payloads in; failures they report are replaced by neutral defaults here.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::anomaly::{evaluate_fear_level, fear_alert_for_scores};
use crate::cache::{cache_key, whale_query, ResultCache, FEAR_METER_QUERY};
use crate::campaign::{identify_campaigns, trending_topics};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::fear::{
    alternative_fng, build_meter, historical_stats, investment_action, placeholder_components,
};
use crate::fud::FudScorer;
use crate::models::{
    iso_millis, Article, CryptoHolder, FearComponents, FearMeterResult, FngReading, FudAnalysis,
    FudScore, HolderMap, PressureAnalysis, VcPosition, WhaleTransaction,
};
use crate::trend::fud_momentum;
use crate::whale::{
    analyze_pressure, analyze_vc_concentration, concentration_risk, detect_unusual_activity,
    ConcentrationMode, ExchangeLabelClassifier, FlowClassifier, WhaleSource,
};

const FNG_UPSTREAM: &str = "alternative.me";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FearRequest {
    /// Caller-measured components. When absent the placeholder generators run.
    pub components: Option<FearComponents>,
    /// Latest external index reading, as fetched.
    pub fng: Option<FngReading>,
    /// Set by the fetcher when the index request failed.
    pub upstream_error: Option<String>,
}

/// Raw result of an upstream whale/holder/VC fetch.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpstreamPayload {
    pub whale_transactions: Vec<WhaleTransaction>,
    pub holders: HolderMap,
    pub vc_movements: Vec<VcPosition>,
    pub error: Option<String>,
}

fn default_source() -> String {
    WhaleSource::Whales.as_str().to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Fud {
        articles: Value,
    },
    Fear(FearRequest),
    Whale {
        #[serde(default = "default_source")]
        source: String,
        #[serde(default)]
        payload: UpstreamPayload,
    },
    Pressure {
        transactions: Vec<WhaleTransaction>,
    },
    Concentration {
        holders: Vec<CryptoHolder>,
        #[serde(default)]
        top_n: Option<usize>,
        #[serde(default)]
        mode: Option<ConcentrationMode>,
    },
    VcConcentration {
        positions: Vec<VcPosition>,
    },
    Campaigns {
        articles: Vec<FudScore>,
    },
    Trending {
        articles: Vec<FudScore>,
    },
    Momentum {
        current: FudAnalysis,
        previous: FudAnalysis,
    },
    Anomaly {
        current: u8,
        history: Vec<u8>,
    },
    Alert {
        current: u8,
        previous: u8,
    },
    Stats {
        measurements: Vec<FearMeterResult>,
    },
    Action {
        score: u8,
    },
}

impl Request {
    pub fn from_json(line: &str) -> EngineResult<Self> {
        serde_json::from_str(line).map_err(|e| EngineError::usage(format!("invalid request: {e}")))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WhaleData {
    WhaleTransactions(Vec<WhaleTransaction>),
    Holders(HolderMap),
    VcMovements(Vec<VcPosition>),
}

#[derive(Debug, Clone, Serialize)]
pub struct WhaleResponse {
    pub success: bool,
    pub timestamp: String,
    #[serde(flatten)]
    pub data: WhaleData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhaleAnalysis {
    pub pressure: PressureAnalysis,
    /// Transfers at or above the generic threshold.
    pub unusual_activity: Vec<WhaleTransaction>,
    /// Transfers at or above the display threshold.
    pub notable_activity: Vec<WhaleTransaction>,
}

pub struct Engine {
    config: EngineConfig,
    scorer: FudScorer,
    classifier: Box<dyn FlowClassifier + Send + Sync>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_classifier(config, Box::new(ExchangeLabelClassifier::default()))
    }

    pub fn with_classifier(
        config: EngineConfig,
        classifier: Box<dyn FlowClassifier + Send + Sync>,
    ) -> Self {
        let scorer = FudScorer::with_keyword_limit(config.keyword_limit);
        Self {
            config,
            scorer,
            classifier,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Score a request body that should be a JSON array of articles.
    pub fn score_fud(&self, body: &Value, now: DateTime<Utc>) -> EngineResult<FudAnalysis> {
        let items = body
            .as_array()
            .ok_or_else(|| EngineError::usage("Expected array of articles"))?;
        let articles = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                Article::deserialize(item)
                    .map_err(|e| EngineError::usage(format!("article {i} is malformed: {e}")))
            })
            .collect::<EngineResult<Vec<Article>>>()?;
        self.scorer
            .score_batch(&articles, self.config.parallel_scoring, now)
    }

    pub fn fear_meter<R: Rng>(
        &self,
        request: FearRequest,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> FearMeterResult {
        let components = match request.components {
            Some(c) => c,
            None => {
                let reading = match request.upstream_error {
                    Some(msg) => Err(EngineError::upstream(FNG_UPSTREAM, msg)),
                    None => Ok(request.fng),
                };
                placeholder_components(rng, alternative_fng(reading))
            }
        };
        build_meter(components, now)
    }

    pub fn whale_feed(
        &self,
        source: &str,
        payload: UpstreamPayload,
        now: DateTime<Utc>,
    ) -> EngineResult<WhaleResponse> {
        let source: WhaleSource = source.parse()?;
        let timestamp = iso_millis(now);

        if let Some(error) = payload.error {
            warn!(source = source.as_str(), %error, "upstream fetch failed, returning empty feed");
            let data = match source {
                WhaleSource::Whales => WhaleData::WhaleTransactions(Vec::new()),
                WhaleSource::Holders => WhaleData::Holders(HolderMap::new()),
                WhaleSource::Vcs => WhaleData::VcMovements(Vec::new()),
            };
            return Ok(WhaleResponse {
                success: false,
                timestamp,
                data,
                error: Some(error),
            });
        }

        let data = match source {
            WhaleSource::Whales => WhaleData::WhaleTransactions(payload.whale_transactions),
            WhaleSource::Holders => WhaleData::Holders(payload.holders),
            WhaleSource::Vcs => WhaleData::VcMovements(payload.vc_movements),
        };
        Ok(WhaleResponse {
            success: true,
            timestamp,
            data,
            error: None,
        })
    }

    pub fn whale_analysis(&self, transactions: &[WhaleTransaction]) -> EngineResult<WhaleAnalysis> {
        let pressure = analyze_pressure(transactions, self.classifier.as_ref())?;
        Ok(WhaleAnalysis {
            pressure,
            unusual_activity: detect_unusual_activity(
                transactions,
                self.config.unusual_threshold_usd,
            ),
            notable_activity: detect_unusual_activity(
                transactions,
                self.config.display_unusual_threshold_usd,
            ),
        })
    }

    /// Serve `request`, consulting `cache` for the parameterless queries.
    /// Failed upstream feeds are returned but never stored.
    pub fn handle<C: ResultCache, R: Rng>(
        &self,
        request: Request,
        cache: &mut C,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> EngineResult<Value> {
        match request {
            Request::Fud { articles } => to_json(&self.score_fud(&articles, now)?),
            Request::Fear(req) => {
                if req.components.is_some() {
                    return to_json(&self.fear_meter(req, rng, now));
                }
                let ttl = self.config.cache.fear_secs;
                cached(cache, FEAR_METER_QUERY, ttl, now, || {
                    Ok((to_json(&self.fear_meter(req, rng, now))?, true))
                })
            }
            Request::Whale { source, payload } => {
                // Reject bad selectors before touching the cache.
                let parsed: WhaleSource = source.parse()?;
                let ttl = self.config.cache.whale_secs;
                cached(cache, &whale_query(parsed.as_str()), ttl, now, || {
                    let response = self.whale_feed(&source, payload, now)?;
                    Ok((to_json(&response)?, response.success))
                })
            }
            Request::Pressure { transactions } => to_json(&self.whale_analysis(&transactions)?),
            Request::Concentration {
                holders,
                top_n,
                mode,
            } => {
                let pct = concentration_risk(
                    &holders,
                    top_n.unwrap_or(self.config.concentration_top_n),
                    mode.unwrap_or(self.config.concentration_mode),
                )?;
                Ok(serde_json::json!({ "concentration": pct }))
            }
            Request::VcConcentration { positions } => {
                to_json(&analyze_vc_concentration(&positions))
            }
            Request::Campaigns { articles } => to_json(&identify_campaigns(
                &articles,
                self.config.campaign_min_size,
            )),
            Request::Trending { articles } => to_json(&trending_topics(&articles)),
            Request::Momentum { current, previous } => {
                Ok(serde_json::json!({ "momentum": fud_momentum(&current, &previous) }))
            }
            Request::Anomaly { current, history } => to_json(&evaluate_fear_level(
                current,
                &history,
                self.config.anomaly_sigma,
            )?),
            Request::Alert { current, previous } => {
                to_json(&fear_alert_for_scores(current, previous))
            }
            Request::Stats { measurements } => to_json(&historical_stats(&measurements)?),
            Request::Action { score } => to_json(&investment_action(score)),
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> EngineResult<Value> {
    serde_json::to_value(value).map_err(|e| EngineError::computation(e.to_string()))
}

fn cached<C, F>(
    cache: &mut C,
    query: &str,
    ttl_secs: u64,
    now: DateTime<Utc>,
    compute: F,
) -> EngineResult<Value>
where
    C: ResultCache,
    F: FnOnce() -> EngineResult<(Value, bool)>,
{
    let key = cache_key(query);
    if let Some(hit) = cache.get(&key, now) {
        debug!(query, "cache hit");
        return Ok(hit);
    }
    let (value, storable) = compute()?;
    if storable {
        cache.set(&key, value.clone(), ttl_secs, now);
        info!(query, ttl_secs, "cache miss, stored fresh result");
    } else {
        debug!(query, "cache miss, result not stored");
    }
    Ok(value)
}
