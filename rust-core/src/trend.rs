//! Directional signals: fear-score trend, flow sentiment and FUD momentum.

use serde::{Deserialize, Serialize};

use crate::models::FudAnalysis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

impl Trend {
    /// High fear reads bearish, low fear bullish, 40..=60 neutral.
    pub fn from_fear_score(score: u8) -> Self {
        if score > 60 {
            Trend::Bearish
        } else if score < 40 {
            Trend::Bullish
        } else {
            Trend::Neutral
        }
    }

    pub fn from_pressure(buy: u32, sell: u32) -> Self {
        if buy > sell {
            Trend::Bullish
        } else if sell > buy {
            Trend::Bearish
        } else {
            Trend::Neutral
        }
    }
}

/// Change in average FUD score between two analyses. Positive means rising FUD.
pub fn fud_momentum(current: &FudAnalysis, previous: &FudAnalysis) -> i32 {
    i32::from(current.aggregate_metrics.average_fud_score)
        - i32::from(previous.aggregate_metrics.average_fud_score)
}
