//! Keyword and pattern based FUD scoring for news text.
//!
//! Each text is scored by summing weighted keyword occurrences per severity tier,
//! adding a flat bonus per uncertainty pattern that fires, and subtracting FOMO
//! language. Article scores blend title, description and content.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use regex::Regex;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::models::{
    iso_millis, AggregateMetrics, Article, ArticleRef, FudAnalysis, FudLevel, FudScore,
    KeywordMatch, Severity,
};

pub const CRITICAL_KEYWORDS: &[&str] = &[
    "hack",
    "exploit",
    "breach",
    "fraud",
    "collapse",
    "bankrupt",
    "scam",
    "crash",
    "useless",
    "dead",
    "ponzi",
    "rug pull",
    "exit scam",
    "hacked",
    "stolen",
];

pub const HIGH_KEYWORDS: &[&str] = &[
    "ban",
    "illegal",
    "lawsuit",
    "investigation",
    "indictment",
    "prison",
    "arrest",
    "subpoena",
    "delisted",
    "shutdown",
    "fallout",
    "betrayal",
    "convicted",
];

pub const MEDIUM_KEYWORDS: &[&str] = &[
    "concern",
    "warning",
    "risk",
    "doubt",
    "skeptic",
    "failed",
    "worst",
    "worst performing",
    "down",
    "slump",
    "plummet",
];

/// Bullish language. Each occurrence takes points off the FUD score.
pub const FOMO_KEYWORDS: &[&str] = &[
    "moon",
    "surge",
    "rally",
    "boom",
    "explosion",
    "breakout",
    "pump",
    "bull",
    "bullish",
    "lambo",
    "skyrocket",
    "soaring",
];

pub const UNCERTAINTY_PATTERNS: &[&str] = &[
    r"(?i)could (result in|lead to|mean) market collapse",
    r"(?i)potential (end|death|death) of",
    r"(?i)imminent (doom|crisis|failure)",
    r"(?i)warning (sign|signal) of",
    r"(?i)red flags",
    r"(?i)major red flag",
];

/// Tier iteration order for both scoring and keyword extraction.
pub const KEYWORD_TIERS: [(Severity, &[&str]); 3] = [
    (Severity::Critical, CRITICAL_KEYWORDS),
    (Severity::High, HIGH_KEYWORDS),
    (Severity::Medium, MEDIUM_KEYWORDS),
];

const PATTERN_WEIGHT: i64 = 5;
const FOMO_WEIGHT: i64 = 2;

const TITLE_WEIGHT: f64 = 0.6;
const DESCRIPTION_WEIGHT: f64 = 0.4;
const CONTENT_WEIGHT: f64 = 0.5;
/// Not the weight sum: a title-only article keeps 0.6 / 1.5 of its raw score.
const FIELD_NORMALIZER: f64 = 1.5;

pub const DEFAULT_KEYWORD_LIMIT: usize = 5;

/// Articles scoring strictly above this are FUD.
pub const FUD_THRESHOLD: u8 = 40;

pub fn is_fud_score(score: u8) -> bool {
    score > FUD_THRESHOLD
}

/// Non-overlapping occurrences of `needle` in already lower-cased text.
fn occurrences(haystack: &str, needle: &str) -> i64 {
    haystack.matches(needle).count() as i64
}

#[derive(Debug, Clone)]
pub struct FudScorer {
    patterns: Vec<Regex>,
    keyword_limit: usize,
}

impl Default for FudScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl FudScorer {
    pub fn new() -> Self {
        Self::with_keyword_limit(DEFAULT_KEYWORD_LIMIT)
    }

    pub fn with_keyword_limit(keyword_limit: usize) -> Self {
        let patterns = UNCERTAINTY_PATTERNS
            .iter()
            .map(|p| Regex::new(p).expect("built-in uncertainty pattern compiles"))
            .collect();
        Self {
            patterns,
            keyword_limit,
        }
    }

    /// Score one text blob into 0..=100. Missing or empty text scores 0.
    pub fn score_text(&self, text: Option<&str>) -> u8 {
        let text = match text {
            Some(t) if !t.is_empty() => t,
            _ => return 0,
        };
        let lower = text.to_lowercase();
        let mut score: i64 = 0;

        for (severity, keywords) in KEYWORD_TIERS {
            for keyword in keywords {
                score += occurrences(&lower, keyword) * severity.weight();
            }
        }

        // Patterns count once each, however often they match.
        for pattern in &self.patterns {
            if pattern.is_match(text) {
                score += PATTERN_WEIGHT;
            }
        }

        for keyword in FOMO_KEYWORDS {
            score -= occurrences(&lower, keyword) * FOMO_WEIGHT;
        }

        score.clamp(0, 100) as u8
    }

    /// Severity-tagged keywords present in `text`, tier order then list order.
    pub fn extract_keywords(&self, text: &str) -> Vec<KeywordMatch> {
        let lower = text.to_lowercase();
        let mut found = Vec::new();
        for (severity, keywords) in KEYWORD_TIERS {
            for keyword in keywords {
                if lower.contains(keyword) {
                    found.push(KeywordMatch {
                        keyword: keyword.to_string(),
                        severity,
                    });
                }
            }
        }
        found.truncate(self.keyword_limit);
        found
    }

    pub fn score_article(&self, article: &Article) -> FudScore {
        let title = f64::from(self.score_text(Some(article.title.as_str()))) * TITLE_WEIGHT;
        let description =
            f64::from(self.score_text(article.description.as_deref())) * DESCRIPTION_WEIGHT;
        let content = f64::from(self.score_text(article.content.as_deref())) * CONTENT_WEIGHT;

        let fud_score = ((title + description + content) / FIELD_NORMALIZER).round() as u8;

        let keyword_text = format!(
            "{} {}",
            article.title,
            article.description.as_deref().unwrap_or("")
        );

        FudScore {
            article: ArticleRef::from(article),
            fud_score,
            fud_level: FudLevel::from_score(fud_score),
            is_fud: is_fud_score(fud_score),
            keywords: self.extract_keywords(&keyword_text),
        }
    }

    /// Score a batch and summarize it. Articles come back sorted by score,
    /// highest first, ties in input order.
    pub fn score_batch(
        &self,
        articles: &[Article],
        parallel: bool,
        at: DateTime<Utc>,
    ) -> EngineResult<FudAnalysis> {
        if articles.is_empty() {
            return Err(EngineError::usage("Expected non-empty array of articles"));
        }

        let mut scored: Vec<FudScore> = if parallel {
            articles.par_iter().map(|a| self.score_article(a)).collect()
        } else {
            articles.iter().map(|a| self.score_article(a)).collect()
        };

        let n = scored.len() as f64;
        let total: u32 = scored.iter().map(|s| u32::from(s.fud_score)).sum();
        let average = (f64::from(total) / n).round() as u8;
        let fud_count = scored.iter().filter(|s| s.is_fud).count();
        let fud_percentage = ((fud_count as f64 / n) * 100.0).round() as u8;

        scored.sort_by(|a, b| b.fud_score.cmp(&a.fud_score));

        debug!(
            articles = scored.len(),
            average, fud_count, "scored article batch"
        );

        Ok(FudAnalysis {
            timestamp: iso_millis(at),
            articles_scored: scored.len(),
            aggregate_metrics: AggregateMetrics {
                average_fud_score: average,
                fud_articles_count: fud_count,
                fud_percentage,
                fud_level: FudLevel::from_score(average),
            },
            articles: scored,
        })
    }
}

/// Keep articles at or above `min_level`, preserving order.
pub fn filter_by_level(articles: &[FudScore], min_level: FudLevel) -> Vec<FudScore> {
    articles
        .iter()
        .filter(|a| a.fud_level >= min_level)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn article(title: &str, description: Option<&str>, content: Option<&str>) -> Article {
        Article {
            title: title.to_string(),
            description: description.map(str::to_string),
            content: content.map(str::to_string),
            source: "test".to_string(),
            url: "https://example.com".to_string(),
            timestamp: "2024-05-01T00:00:00.000Z".to_string(),
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    const HEAVY_FUD: &str = "Hack, exploit and fraud: stolen funds, bankrupt exchange, \
                             ponzi scheme, crash and collapse leave the token dead";

    #[test]
    fn test_empty_text_scores_zero() {
        let scorer = FudScorer::new();
        assert_eq!(scorer.score_text(None), 0);
        assert_eq!(scorer.score_text(Some("")), 0);
        assert_eq!(scorer.score_text(Some("A quiet day for markets")), 0);
    }

    #[test]
    fn test_tier_weights() {
        let scorer = FudScorer::new();
        assert_eq!(scorer.score_text(Some("exploit")), 10);
        assert_eq!(scorer.score_text(Some("lawsuit")), 6);
        assert_eq!(scorer.score_text(Some("slump")), 2);
        assert_eq!(scorer.score_text(Some("SCAM scam Scam")), 30);
    }

    #[test]
    fn test_overlapping_keywords_both_count() {
        let scorer = FudScorer::new();
        // "hacked" is also an occurrence of "hack"
        assert_eq!(scorer.score_text(Some("exchange hacked")), 20);
        // "bankrupt" carries "ban"
        assert_eq!(scorer.score_text(Some("bankrupt")), 16);
    }

    #[test]
    fn test_patterns_count_once() {
        let scorer = FudScorer::new();
        assert_eq!(scorer.score_text(Some("red flags, more red flags")), 5);
        assert_eq!(scorer.score_text(Some("Imminent Crisis ahead")), 5);
    }

    #[test]
    fn test_fomo_suppresses_and_clamps() {
        let scorer = FudScorer::new();
        assert_eq!(scorer.score_text(Some("moon moon lambo")), 0);
        assert_eq!(scorer.score_text(Some("crash then moon")), 8);
    }

    #[test]
    fn test_score_is_bounded_and_monotone() {
        let scorer = FudScorer::new();
        // One keyword per tier; none contains another listed keyword.
        for (word, reps) in [("crash ", 20), ("lawsuit ", 30), ("slump ", 60)] {
            let mut prev = 0;
            for n in 0..reps {
                let text = word.repeat(n);
                let s = scorer.score_text(Some(&text));
                assert!(s <= 100, "{word} x{n}");
                assert!(s >= prev, "{word} x{n}");
                prev = s;
            }
            assert_eq!(prev, 100, "{word}");
        }
    }

    #[test]
    fn test_title_only_article_keeps_forty_percent() {
        let scorer = FudScorer::new();
        let scored = scorer.score_article(&article("hack", None, None));
        assert_eq!(scored.fud_score, 4);
        assert_eq!(scored.fud_level, FudLevel::Minimal);
        assert!(!scored.is_fud);
    }

    #[test]
    fn test_fud_threshold_is_strict() {
        assert!(!is_fud_score(40));
        assert!(is_fud_score(41));
        assert_eq!(FudLevel::from_score(40), FudLevel::Moderate);
    }

    #[test]
    fn test_keyword_extraction_order_and_limit() {
        let scorer = FudScorer::new();
        let found = scorer.extract_keywords("Warning: lawsuit follows hack and stolen keys");
        let names: Vec<&str> = found.iter().map(|k| k.keyword.as_str()).collect();
        assert_eq!(names, vec!["hack", "stolen", "lawsuit", "warning"]);
        assert_eq!(found[0].severity, Severity::Critical);
        assert_eq!(found[3].severity, Severity::Medium);

        let found = scorer.extract_keywords(HEAVY_FUD);
        let names: Vec<&str> = found.iter().map(|k| k.keyword.as_str()).collect();
        assert_eq!(names, vec!["hack", "exploit", "fraud", "collapse", "bankrupt"]);
    }

    #[test]
    fn test_keywords_ignore_content_field() {
        let scorer = FudScorer::new();
        let scored = scorer.score_article(&article("Calm day", None, Some("ponzi")));
        assert!(scored.keywords.is_empty());
    }

    #[test]
    fn test_hack_headline_outscores_rally_headline() {
        let scorer = FudScorer::new();
        let hack = scorer.score_article(&article(
            "Bitcoin Hack Drains Exchange",
            Some(HEAVY_FUD),
            Some(HEAVY_FUD),
        ));
        let rally = scorer.score_article(&article("ETH rallies to new highs", None, None));

        assert_eq!(hack.fud_score, 62);
        assert!(hack.is_fud);
        assert_eq!(hack.fud_level, FudLevel::High);
        assert_eq!(rally.fud_score, 0);
        assert!(!rally.is_fud);
        assert!(hack.fud_score > rally.fud_score);
    }

    #[test]
    fn test_batch_aggregates_and_sorts() {
        let scorer = FudScorer::new();
        let articles = vec![
            article("ETH rallies to new highs", None, None),
            article("Bitcoin Hack Drains Exchange", Some(HEAVY_FUD), Some(HEAVY_FUD)),
            article("hack", None, None),
        ];
        let result = scorer.score_batch(&articles, false, at()).unwrap();

        assert_eq!(result.articles_scored, 3);
        assert_eq!(result.timestamp, "2024-05-01T00:00:00.000Z");
        // (0 + 62 + 4) / 3 = 22
        assert_eq!(result.aggregate_metrics.average_fud_score, 22);
        assert_eq!(result.aggregate_metrics.fud_articles_count, 1);
        assert_eq!(result.aggregate_metrics.fud_percentage, 33);
        assert_eq!(result.aggregate_metrics.fud_level, FudLevel::Low);

        let scores: Vec<u8> = result.articles.iter().map(|a| a.fud_score).collect();
        assert_eq!(scores, vec![62, 4, 0]);
    }

    #[test]
    fn test_parallel_batch_matches_sequential() {
        let scorer = FudScorer::new();
        let articles: Vec<Article> = (0..64)
            .map(|i| {
                let title = match i % 4 {
                    0 => "Exchange hacked overnight",
                    1 => "Lawsuit filed",
                    2 => "Flat session",
                    _ => "Scam warning issued",
                };
                let mut a = article(title, Some(title), None);
                a.url = format!("https://example.com/{i}");
                a
            })
            .collect();

        let seq = scorer.score_batch(&articles, false, at()).unwrap();
        let par = scorer.score_batch(&articles, true, at()).unwrap();
        assert_eq!(seq.articles, par.articles);
        assert_eq!(
            serde_json::to_string(&seq).unwrap(),
            serde_json::to_string(&par).unwrap()
        );
    }

    #[test]
    fn test_empty_batch_is_usage_error() {
        let scorer = FudScorer::new();
        let err = scorer.score_batch(&[], true, at()).unwrap_err();
        assert_eq!(err.kind(), "usage");
    }

    #[test]
    fn test_filter_by_level() {
        let scorer = FudScorer::new();
        let scored = vec![
            scorer.score_article(&article("hack", None, None)),
            scorer.score_article(&article("x", Some(HEAVY_FUD), Some(HEAVY_FUD))),
        ];
        let high = filter_by_level(&scored, FudLevel::Moderate);
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].article.title, "x");
        assert_eq!(filter_by_level(&scored, FudLevel::Minimal).len(), 2);
    }
}
