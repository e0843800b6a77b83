//! Whale flow analysis: buy/sell pressure, unusual transfers, holder concentration.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{EngineError, EngineResult};
use crate::models::{CryptoHolder, PressureAnalysis, VcPosition, WhaleTransaction};
use crate::trend::Trend;

/// Threshold used by the generic analyzer.
pub const UNUSUAL_THRESHOLD_USD: f64 = 5_000_000.0;
/// Threshold used when picking transfers for display.
pub const DISPLAY_UNUSUAL_THRESHOLD_USD: f64 = 500_000.0;

pub const CONCENTRATION_TOP_N: usize = 10;

/// Directional reading of one transfer. Buy and sell are judged independently,
/// so a transfer can count toward both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowSignal {
    pub buy: bool,
    pub sell: bool,
}

pub trait FlowClassifier {
    fn classify(&self, tx: &WhaleTransaction) -> FlowSignal;
}

/// Substring match on the counterparty owner label.
#[derive(Debug, Clone)]
pub struct ExchangeLabelClassifier {
    needle: String,
}

impl Default for ExchangeLabelClassifier {
    fn default() -> Self {
        Self::new("Exchange")
    }
}

impl ExchangeLabelClassifier {
    pub fn new(needle: impl Into<String>) -> Self {
        Self {
            needle: needle.into(),
        }
    }

    fn labelled(&self, owner: Option<&str>) -> bool {
        owner.map_or(false, |o| o.contains(self.needle.as_str()))
    }
}

impl FlowClassifier for ExchangeLabelClassifier {
    fn classify(&self, tx: &WhaleTransaction) -> FlowSignal {
        FlowSignal {
            buy: self.labelled(tx.to.owner.as_deref()),
            sell: self.labelled(tx.from.owner.as_deref()),
        }
    }
}

pub fn analyze_pressure<C: FlowClassifier + ?Sized>(
    transactions: &[WhaleTransaction],
    classifier: &C,
) -> EngineResult<PressureAnalysis> {
    if transactions.is_empty() {
        return Err(EngineError::computation(
            "pressure analysis needs at least one transaction",
        ));
    }

    let mut buy = 0u32;
    let mut sell = 0u32;
    let mut total = 0.0_f64;
    for tx in transactions {
        let signal = classifier.classify(tx);
        if signal.buy {
            buy += 1;
        }
        if signal.sell {
            sell += 1;
        }
        total += tx.amount_usd;
    }

    Ok(PressureAnalysis {
        buy_pressure: buy,
        sell_pressure: sell,
        net_pressure: i64::from(buy) - i64::from(sell),
        total_volume_usd: total,
        average_transaction: total / transactions.len() as f64,
        sentiment: Trend::from_pressure(buy, sell),
    })
}

/// Transfers at or above `threshold_usd`, in input order.
pub fn detect_unusual_activity(
    transactions: &[WhaleTransaction],
    threshold_usd: f64,
) -> Vec<WhaleTransaction> {
    transactions
        .iter()
        .filter(|t| t.amount_usd >= threshold_usd)
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcentrationMode {
    /// First N holders as given. Matches the historical output.
    #[default]
    InputOrder,
    /// N largest holders by USD value.
    LargestFirst,
}

/// Share of total USD value held by the top `top_n` holders, as a percentage.
pub fn concentration_risk(
    holders: &[CryptoHolder],
    top_n: usize,
    mode: ConcentrationMode,
) -> EngineResult<f64> {
    let total: f64 = holders.iter().map(|h| h.usd_value).sum();
    if holders.is_empty() || total == 0.0 {
        return Err(EngineError::computation(
            "concentration needs holders with non-zero total value",
        ));
    }

    let top: f64 = match mode {
        ConcentrationMode::InputOrder => holders.iter().take(top_n).map(|h| h.usd_value).sum(),
        ConcentrationMode::LargestFirst => {
            let mut values: Vec<f64> = holders.iter().map(|h| h.usd_value).collect();
            values.sort_by(|a, b| b.total_cmp(a));
            values.iter().take(top_n).sum()
        }
    };

    Ok((top / total) * 100.0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VcConcentration {
    pub vc: String,
    pub portfolio: Vec<String>,
    /// Null when the portfolio is empty.
    pub concentration: Option<f64>,
    pub aum: f64,
}

pub fn analyze_vc_concentration(positions: &[VcPosition]) -> Vec<VcConcentration> {
    positions
        .iter()
        .map(|vc| VcConcentration {
            vc: vc.vc.clone(),
            portfolio: vc.portfolio.clone(),
            concentration: (!vc.portfolio.is_empty()).then(|| {
                (vc.recent_activity.major_holdings.len() as f64 / vc.portfolio.len() as f64)
                    * 100.0
            }),
            aum: vc.recent_activity.total_aum,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhaleSource {
    Whales,
    Holders,
    Vcs,
}

impl WhaleSource {
    pub fn as_str(self) -> &'static str {
        match self {
            WhaleSource::Whales => "whales",
            WhaleSource::Holders => "holders",
            WhaleSource::Vcs => "vcs",
        }
    }
}

impl FromStr for WhaleSource {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "whales" => Ok(WhaleSource::Whales),
            "holders" => Ok(WhaleSource::Holders),
            "vcs" => Ok(WhaleSource::Vcs),
            _ => Err(EngineError::usage("Unknown source. Use: whales, holders, vcs")),
        }
    }
}
