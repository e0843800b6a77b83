//! Weighted fear index over named 0..=100 sub-scores.
//!
//! Absent components are skipped without redistributing their weight, so a
//! missing external index caps the reachable score at 75. `weight_covered`
//! reports how much of the weight actually contributed.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};
use crate::models::{
    iso_millis, FearComponents, FearLevel, FearMeterResult, FearSignals, FearStatus,
    FngReading, HistoricalContext,
};
use crate::trend::Trend;

pub const WEIGHT_ALTERNATIVE_FNG: f64 = 0.25;
pub const WEIGHT_VOLATILITY: f64 = 0.15;
pub const WEIGHT_WHALE_ACTIVITY: f64 = 0.15;
pub const WEIGHT_REGULATORY: f64 = 0.2;
pub const WEIGHT_LIQUIDATIONS: f64 = 0.15;
pub const WEIGHT_MACRO: f64 = 0.1;

pub const ALL_TIME_HIGH: u8 = 93;
pub const ALL_TIME_LOW: u8 = 10;

/// Fixed regional regulatory pressure: UK, US, HK/China, EU.
const REGULATORY_RISK_FACTORS: [f64; 4] = [25.0, 35.0, 45.0, 20.0];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FearAggregate {
    pub score: u8,
    pub weight_covered: f64,
}

impl FearComponents {
    /// Components in weighting order, paired with their weight.
    fn weighted(&self) -> [(Option<u8>, f64); 6] {
        [
            (self.alternative_fng, WEIGHT_ALTERNATIVE_FNG),
            (Some(self.volatility), WEIGHT_VOLATILITY),
            (Some(self.whale_activity), WEIGHT_WHALE_ACTIVITY),
            (Some(self.regulatory), WEIGHT_REGULATORY),
            (Some(self.liquidations), WEIGHT_LIQUIDATIONS),
            (Some(self.macro_fear), WEIGHT_MACRO),
        ]
    }
}

pub fn aggregate(components: &FearComponents) -> FearAggregate {
    let mut total = 0.0_f64;
    let mut covered = 0.0_f64;
    for (value, weight) in components.weighted() {
        if let Some(v) = value {
            total += f64::from(v) * weight;
            covered += weight;
        }
    }
    FearAggregate {
        score: total.round() as u8,
        weight_covered: covered,
    }
}

pub fn fear_level(score: u8) -> FearLevel {
    match score {
        75.. => FearLevel::ExtremeFear,
        60..=74 => FearLevel::HighFear,
        45..=59 => FearLevel::ModerateFear,
        30..=44 => FearLevel::SlightFear,
        15..=29 => FearLevel::Greed,
        _ => FearLevel::ExtremeGreed,
    }
}

impl FearLevel {
    pub fn emoji(self) -> &'static str {
        match self {
            FearLevel::ExtremeFear => "\u{1F631}",
            FearLevel::HighFear => "\u{1F61F}",
            FearLevel::ModerateFear => "\u{1F610}",
            FearLevel::SlightFear => "\u{1F914}",
            FearLevel::Greed => "\u{1F911}",
            FearLevel::ExtremeGreed => "\u{1F680}",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            FearLevel::ExtremeFear => "#d32f2f",
            FearLevel::HighFear => "#f57c00",
            FearLevel::ModerateFear => "#ffa726",
            FearLevel::SlightFear => "#ffb74d",
            FearLevel::Greed => "#4caf50",
            FearLevel::ExtremeGreed => "#2e7d32",
        }
    }
}

pub fn fear_status(score: u8) -> FearStatus {
    let level = fear_level(score);
    FearStatus {
        level,
        emoji: level.emoji().to_string(),
        color: level.color().to_string(),
    }
}

/// Three advisory lines. Greed and extreme greed share the bottom bracket.
pub fn recommendations(score: u8) -> [&'static str; 3] {
    match score {
        75.. => [
            "Extreme fear detected - historically strong buying opportunities for long-term holders",
            "Monitor liquidation cascades",
            "Watch for major institutional accumulation",
        ],
        60..=74 => [
            "High fear environment - consider DCA strategy",
            "Review staking yields for income",
            "Reduce leverage exposure",
        ],
        45..=59 => [
            "Moderate fear - balanced risk-reward",
            "Monitor whale movements",
            "Track regulatory developments",
        ],
        30..=44 => [
            "Slight fear - potential consolidation phase",
            "Consider profit-taking on winners",
            "Monitor macro headwinds",
        ],
        _ => [
            "Greed phase - historically precedes corrections",
            "Increase risk management strictness",
            "Review portfolio concentration",
        ],
    }
}

/// Assemble the full meter snapshot for a set of components.
pub fn build_meter(components: FearComponents, at: DateTime<Utc>) -> FearMeterResult {
    let FearAggregate {
        score,
        weight_covered,
    } = aggregate(&components);
    debug!(score, weight_covered, "aggregated fear components");

    FearMeterResult {
        timestamp: iso_millis(at),
        fear_score: score,
        fear_status: fear_status(score),
        components,
        signals: FearSignals {
            trend: Trend::from_fear_score(score),
            recommendations: recommendations(score).iter().map(|s| s.to_string()).collect(),
        },
        historical_context: HistoricalContext {
            all_time_high: ALL_TIME_HIGH,
            all_time_low: ALL_TIME_LOW,
            current_percentile: ((f64::from(score) / 100.0) * 100.0).round() as u8,
        },
    }
}

/// Resolve the external index from an upstream fetch. A failed or unreadable
/// reading becomes an absent component.
pub fn alternative_fng(reading: Result<Option<FngReading>, EngineError>) -> Option<u8> {
    match reading {
        Ok(Some(r)) => {
            if r.value.is_none() {
                warn!("fear & greed reading has no usable value");
            }
            r.value
        }
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "fear & greed fetch failed, leaving component absent");
            None
        }
    }
}

pub fn regulatory_risk() -> u8 {
    let sum: f64 = REGULATORY_RISK_FACTORS.iter().sum();
    (sum / REGULATORY_RISK_FACTORS.len() as f64).round() as u8
}

/// Stand-in values for sub-scores that have no real feed yet.
pub fn placeholder_components<R: Rng>(
    rng: &mut R,
    alternative_fng: Option<u8>,
) -> FearComponents {
    FearComponents {
        alternative_fng,
        volatility: (rng.gen::<f64>() * 100.0).round() as u8,
        whale_activity: (rng.gen::<f64>() * 100.0).round() as u8,
        regulatory: regulatory_risk(),
        liquidations: (rng.gen::<f64>() * 60.0).round() as u8,
        macro_fear: (rng.gen::<f64>() * 70.0).round() as u8,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Hold,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InvestmentAction {
    pub action: Action,
    pub confidence: f64,
}

/// Contrarian read of the fear score.
pub fn investment_action(score: u8) -> InvestmentAction {
    let (action, confidence) = match score {
        80.. => (Action::Buy, 0.9),
        65..=79 => (Action::Buy, 0.7),
        50..=64 => (Action::Hold, 0.5),
        35..=49 => (Action::Hold, 0.6),
        20..=34 => (Action::Sell, 0.6),
        _ => (Action::Sell, 0.8),
    };
    InvestmentAction { action, confidence }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalStats {
    pub average: f64,
    pub median: f64,
    pub std_dev: f64,
    pub max: u8,
    pub min: u8,
}

pub fn historical_stats(measurements: &[FearMeterResult]) -> EngineResult<HistoricalStats> {
    if measurements.is_empty() {
        return Err(EngineError::computation(
            "historical stats need at least one measurement",
        ));
    }
    let scores: Vec<f64> = measurements.iter().map(|m| f64::from(m.fear_score)).collect();
    let mut sorted = scores.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len();
    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };
    let (mean, std) = crate::anomaly::mean_std(&scores);

    Ok(HistoricalStats {
        average: mean.round(),
        median,
        std_dev: std.round(),
        max: sorted[n - 1] as u8,
        min: sorted[0] as u8,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn components(fng: Option<u8>, v: u8) -> FearComponents {
        FearComponents {
            alternative_fng: fng,
            volatility: v,
            whale_activity: v,
            regulatory: v,
            liquidations: v,
            macro_fear: v,
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_uniform_components_reproduce_themselves() {
        let agg = aggregate(&components(Some(50), 50));
        assert_eq!(agg.score, 50);
        assert!((agg.weight_covered - 1.0).abs() < 1e-9);

        assert_eq!(aggregate(&components(Some(100), 100)).score, 100);
        assert_eq!(aggregate(&components(Some(0), 0)).score, 0);
    }

    #[test]
    fn test_missing_index_is_not_renormalized() {
        let agg = aggregate(&components(None, 50));
        assert_eq!(agg.score, 38);
        assert!((agg.weight_covered - 0.75).abs() < 1e-9);

        assert_eq!(aggregate(&components(None, 100)).score, 75);
    }

    #[test]
    fn test_mixed_components() {
        let c = FearComponents {
            alternative_fng: Some(80),
            volatility: 40,
            whale_activity: 60,
            regulatory: 31,
            liquidations: 20,
            macro_fear: 10,
        };
        // 20 + 6 + 9 + 6.2 + 3 + 1 = 45.2
        assert_eq!(aggregate(&c).score, 45);
    }

    #[test]
    fn test_status_buckets() {
        assert_eq!(fear_level(100), FearLevel::ExtremeFear);
        assert_eq!(fear_level(75), FearLevel::ExtremeFear);
        assert_eq!(fear_level(74), FearLevel::HighFear);
        assert_eq!(fear_level(60), FearLevel::HighFear);
        assert_eq!(fear_level(59), FearLevel::ModerateFear);
        assert_eq!(fear_level(45), FearLevel::ModerateFear);
        assert_eq!(fear_level(44), FearLevel::SlightFear);
        assert_eq!(fear_level(30), FearLevel::SlightFear);
        assert_eq!(fear_level(29), FearLevel::Greed);
        assert_eq!(fear_level(15), FearLevel::Greed);
        assert_eq!(fear_level(14), FearLevel::ExtremeGreed);
        assert_eq!(fear_level(0), FearLevel::ExtremeGreed);

        let status = fear_status(80);
        assert_eq!(status.color, "#d32f2f");
        assert_eq!(status.emoji, "😱");
    }

    #[test]
    fn test_recommendation_brackets() {
        assert_eq!(recommendations(75)[1], "Monitor liquidation cascades");
        assert_eq!(recommendations(60)[2], "Reduce leverage exposure");
        assert_eq!(recommendations(45)[0], "Moderate fear - balanced risk-reward");
        assert_eq!(recommendations(30)[2], "Monitor macro headwinds");
        assert_eq!(recommendations(29), recommendations(0));
    }

    #[test]
    fn test_build_meter_snapshot() {
        let meter = build_meter(components(Some(70), 70), at());
        assert_eq!(meter.fear_score, 70);
        assert_eq!(meter.fear_status.level, FearLevel::HighFear);
        assert_eq!(meter.signals.trend, Trend::Bearish);
        assert_eq!(meter.signals.recommendations.len(), 3);
        assert_eq!(meter.historical_context.current_percentile, 70);
        assert_eq!(meter.historical_context.all_time_high, 93);
        assert_eq!(meter.timestamp, "2024-06-01T08:30:00.000Z");

        let json = serde_json::to_value(&meter).unwrap();
        assert_eq!(json["fearStatus"]["level"], "HIGH FEAR");
        assert_eq!(json["signals"]["trend"], "bearish");
        assert_eq!(json["components"]["alternativeFng"], 70);
    }

    #[test]
    fn test_failed_upstream_leaves_component_absent() {
        let failed = Err(EngineError::upstream("fear-greed", "timeout"));
        assert_eq!(alternative_fng(failed), None);
        assert_eq!(alternative_fng(Ok(None)), None);

        let reading = FngReading {
            value: Some(27),
            ..Default::default()
        };
        assert_eq!(alternative_fng(Ok(Some(reading))), Some(27));
    }

    #[test]
    fn test_placeholder_components_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let c = placeholder_components(&mut rng, None);
            assert!(c.volatility <= 100);
            assert!(c.whale_activity <= 100);
            assert_eq!(c.regulatory, 31);
            assert!(c.liquidations <= 60);
            assert!(c.macro_fear <= 70);
            assert!(aggregate(&c).score <= 75);
        }
    }

    #[test]
    fn test_investment_action() {
        assert_eq!(investment_action(85).action, Action::Buy);
        assert_eq!(investment_action(70).confidence, 0.7);
        assert_eq!(investment_action(50).action, Action::Hold);
        assert_eq!(investment_action(35).confidence, 0.6);
        assert_eq!(investment_action(20).action, Action::Sell);
        assert_eq!(investment_action(5).confidence, 0.8);
    }

    #[test]
    fn test_historical_stats() {
        let history: Vec<FearMeterResult> = [20u8, 40, 60, 80]
            .iter()
            .map(|&s| build_meter(components(Some(s), s), at()))
            .collect();
        let stats = historical_stats(&history).unwrap();
        assert_eq!(stats.average, 50.0);
        assert_eq!(stats.median, 50.0);
        // population std of 20,40,60,80 is sqrt(500) ~ 22.36
        assert_eq!(stats.std_dev, 22.0);
        assert_eq!(stats.max, 80);
        assert_eq!(stats.min, 20);

        assert!(historical_stats(&[]).is_err());
    }
}
