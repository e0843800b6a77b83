use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::trend::Trend;

/// ISO-8601 with millisecond precision and a `Z` suffix.
pub fn iso_millis(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Round and clamp any JSON number into the 0..=100 score domain.
pub fn clamp_pct(v: f64) -> u8 {
    if v.is_nan() {
        return 0;
    }
    v.round().clamp(0.0, 100.0) as u8
}

fn deserialize_pct<'de, D>(d: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let v = f64::deserialize(d)?;
    Ok(clamp_pct(v))
}

fn deserialize_opt_pct<'de, D>(d: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<f64> = Option::deserialize(d)?;
    Ok(opt.map(clamp_pct))
}

/// Upstream index feeds send the value as either a number or a numeric string.
/// Anything that does not lead with an integer is treated as missing.
fn deserialize_lenient_pct<'de, D>(d: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrText {
        Num(f64),
        Text(String),
    }

    let opt: Option<NumOrText> = Option::deserialize(d)?;
    Ok(match opt {
        Some(NumOrText::Num(n)) => Some(clamp_pct(n.trunc())),
        Some(NumOrText::Text(s)) => leading_int(&s).map(|n| clamp_pct(n as f64)),
        None => None,
    })
}

fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

// --- Articles ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRef {
    pub title: String,
    pub source: String,
    pub url: String,
    pub timestamp: String,
}

impl From<&Article> for ArticleRef {
    fn from(a: &Article) -> Self {
        ArticleRef {
            title: a.title.clone(),
            source: a.source.clone(),
            url: a.url.clone(),
            timestamp: a.timestamp.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
}

impl Severity {
    pub fn weight(self) -> i64 {
        match self {
            Severity::Critical => 10,
            Severity::High => 6,
            Severity::Medium => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordMatch {
    pub keyword: String,
    pub severity: Severity,
}

/// Declared low to high so the derived ordering doubles as severity order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FudLevel {
    Minimal,
    Low,
    Moderate,
    High,
    Critical,
}

impl FudLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => FudLevel::Critical,
            60..=79 => FudLevel::High,
            40..=59 => FudLevel::Moderate,
            20..=39 => FudLevel::Low,
            _ => FudLevel::Minimal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FudScore {
    pub article: ArticleRef,
    pub fud_score: u8,
    pub fud_level: FudLevel,
    pub is_fud: bool,
    pub keywords: Vec<KeywordMatch>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateMetrics {
    pub average_fud_score: u8,
    pub fud_articles_count: usize,
    pub fud_percentage: u8,
    pub fud_level: FudLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FudAnalysis {
    pub timestamp: String,
    pub articles_scored: usize,
    pub aggregate_metrics: AggregateMetrics,
    pub articles: Vec<FudScore>,
}

// --- Fear index ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FearComponents {
    #[serde(default, deserialize_with = "deserialize_opt_pct")]
    pub alternative_fng: Option<u8>,
    #[serde(deserialize_with = "deserialize_pct")]
    pub volatility: u8,
    #[serde(deserialize_with = "deserialize_pct")]
    pub whale_activity: u8,
    #[serde(deserialize_with = "deserialize_pct")]
    pub regulatory: u8,
    #[serde(deserialize_with = "deserialize_pct")]
    pub liquidations: u8,
    #[serde(rename = "macro", deserialize_with = "deserialize_pct")]
    pub macro_fear: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FearLevel {
    #[serde(rename = "EXTREME FEAR")]
    ExtremeFear,
    #[serde(rename = "HIGH FEAR")]
    HighFear,
    #[serde(rename = "MODERATE FEAR")]
    ModerateFear,
    #[serde(rename = "SLIGHT FEAR")]
    SlightFear,
    #[serde(rename = "GREED")]
    Greed,
    #[serde(rename = "EXTREME GREED")]
    ExtremeGreed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FearStatus {
    pub level: FearLevel,
    pub emoji: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FearSignals {
    pub trend: Trend,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalContext {
    pub all_time_high: u8,
    pub all_time_low: u8,
    pub current_percentile: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FearMeterResult {
    pub timestamp: String,
    pub fear_score: u8,
    pub fear_status: FearStatus,
    pub components: FearComponents,
    pub signals: FearSignals,
    pub historical_context: HistoricalContext,
}

/// One reading from an external Fear & Greed index feed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FngReading {
    #[serde(default, deserialize_with = "deserialize_lenient_pct")]
    pub value: Option<u8>,
    #[serde(default)]
    pub value_classification: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

// --- Whales ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counterparty {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhaleTransaction {
    pub blockchain: String,
    pub from: Counterparty,
    pub to: Counterparty,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    pub amount: f64,
    pub amount_usd: f64,
    pub timestamp: i64,
    pub transaction_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PressureAnalysis {
    pub buy_pressure: u32,
    pub sell_pressure: u32,
    pub net_pressure: i64,
    pub total_volume_usd: f64,
    pub average_transaction: f64,
    pub sentiment: Trend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HolderType {
    Exchange,
    Trust,
    Defi,
    Government,
    Legacy,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CryptoHolder {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub balance: f64,
    pub usd_value: f64,
    #[serde(rename = "type")]
    pub holder_type: HolderType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VcActivity {
    pub last_update: String,
    #[serde(rename = "totalAUM")]
    pub total_aum: f64,
    pub major_holdings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VcPosition {
    pub vc: String,
    pub portfolio: Vec<String>,
    pub recent_activity: VcActivity,
}

/// Holder lists keyed by asset name, in the order the upstream sent them.
/// A repeated asset key replaces the earlier list in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HolderMap(Vec<(String, Vec<CryptoHolder>)>);

impl HolderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, asset: impl Into<String>, holders: Vec<CryptoHolder>) {
        let asset = asset.into();
        match self.0.iter_mut().find(|(k, _)| *k == asset) {
            Some(slot) => slot.1 = holders,
            None => self.0.push((asset, holders)),
        }
    }

    pub fn get(&self, asset: &str) -> Option<&[CryptoHolder]> {
        self.0
            .iter()
            .find(|(k, _)| k == asset)
            .map(|(_, v)| v.as_slice())
    }

    pub fn assets(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for HolderMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

impl<'de> Deserialize<'de> for HolderMap {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        struct HolderMapVisitor;

        impl<'de> Visitor<'de> for HolderMapVisitor {
            type Value = HolderMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of asset name to holder list")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<HolderMap, A::Error> {
                let mut map = HolderMap::new();
                while let Some((asset, holders)) =
                    access.next_entry::<String, Vec<CryptoHolder>>()?
                {
                    map.insert(asset, holders);
                }
                Ok(map)
            }
        }

        d.deserialize_map(HolderMapVisitor)
    }
}
