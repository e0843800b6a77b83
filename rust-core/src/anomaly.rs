//! Z-score anomaly checks and change alerts over fear score history.

use serde::Serialize;
use std::collections::VecDeque;

use crate::error::{EngineError, EngineResult};
use crate::models::FearMeterResult;

pub const DEFAULT_SIGMA: f64 = 2.0;
pub const HISTORY_CAPACITY: usize = 100;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FearAnomaly {
    pub current: u8,
    pub baseline_mean: f64,
    pub baseline_std: f64,
    pub z_score: f64,
    pub is_anomaly: bool,
}

/// Compare `current` to the historical baseline. Anomalous when it sits more
/// than `sigma` population standard deviations from the mean. A flat history
/// has zero spread, so any deviation at all is anomalous.
pub fn evaluate_fear_level(current: u8, historical: &[u8], sigma: f64) -> EngineResult<FearAnomaly> {
    if historical.is_empty() {
        return Err(EngineError::computation(
            "anomaly check needs a non-empty history",
        ));
    }
    let vals: Vec<f64> = historical.iter().map(|&s| f64::from(s)).collect();
    let (baseline_mean, baseline_std) = mean_std(&vals);
    let deviation = f64::from(current) - baseline_mean;

    let std_safe = if baseline_std <= 0.0 { 1e-9 } else { baseline_std };
    Ok(FearAnomaly {
        current,
        baseline_mean,
        baseline_std,
        z_score: deviation / std_safe,
        is_anomaly: deviation.abs() > sigma * baseline_std,
    })
}

pub fn is_anomalous_fear_level(current: u8, historical: &[u8]) -> EngineResult<bool> {
    Ok(evaluate_fear_level(current, historical, DEFAULT_SIGMA)?.is_anomaly)
}

/// Population mean and standard deviation (divides by N).
pub(crate) fn mean_std(vals: &[f64]) -> (f64, f64) {
    if vals.is_empty() {
        return (0.0, 0.0);
    }
    let n = vals.len() as f64;
    let sum: f64 = vals.iter().sum();
    let mean = sum / n;
    let sq_diff: f64 = vals.iter().map(|v| (v - mean).powi(2)).sum();
    let std = (sq_diff / n).sqrt();
    (mean, std)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Critical,
    High,
    Moderate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FearAlert {
    pub alert: bool,
    pub severity: AlertSeverity,
    pub message: String,
}

/// Alert on sharp moves between two readings. Only big rises, moderate rises
/// and big drops alert; anything else yields `None`.
pub fn fear_alert_for_scores(current: u8, previous: u8) -> Option<FearAlert> {
    let change = i32::from(current) - i32::from(previous);

    let (severity, message) = if change > 20 {
        (AlertSeverity::Critical, format!("Fear spiked by {change} points"))
    } else if change > 10 {
        (AlertSeverity::High, format!("Fear increased by {change} points"))
    } else if change < -20 {
        (
            AlertSeverity::Moderate,
            "Fear dropped sharply - potential momentum shift".to_string(),
        )
    } else {
        return None;
    };

    Some(FearAlert {
        alert: true,
        severity,
        message,
    })
}

pub fn generate_fear_alert(
    current: &FearMeterResult,
    previous: &FearMeterResult,
) -> Option<FearAlert> {
    fear_alert_for_scores(current.fear_score, previous.fear_score)
}

/// Fixed-capacity rolling window of meter readings; the oldest is evicted first.
#[derive(Debug, Clone)]
pub struct FearHistory {
    capacity: usize,
    entries: VecDeque<FearMeterResult>,
}

impl Default for FearHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl FearHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, reading: FearMeterResult) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(reading);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&FearMeterResult> {
        self.entries.back()
    }

    pub fn scores(&self) -> Vec<u8> {
        self.entries.iter().map(|m| m.fear_score).collect()
    }

    /// Check `score` against the recorded scores. `None` while the history is empty.
    pub fn check(&self, score: u8, sigma: f64) -> Option<FearAnomaly> {
        if self.is_empty() {
            return None;
        }
        evaluate_fear_level(score, &self.scores(), sigma).ok()
    }

    /// Record `reading`, returning the alert against the previous latest, if any.
    pub fn record(&mut self, reading: FearMeterResult) -> Option<FearAlert> {
        let alert = self
            .latest()
            .and_then(|prev| generate_fear_alert(&reading, prev));
        self.push(reading);
        alert
    }
}
