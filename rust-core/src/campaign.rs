//! Narrative clustering over scored articles.

use serde::Serialize;
use std::collections::HashMap;

use crate::models::FudScore;

pub const MIN_CAMPAIGN_SIZE: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Campaign {
    pub keyword: String,
    pub members: Vec<FudScore>,
}

/// Group FUD articles by their leading keyword and keep groups of at least
/// `min_size`. Campaigns come out in order of first appearance.
pub fn identify_campaigns(articles: &[FudScore], min_size: usize) -> Vec<Campaign> {
    let mut campaigns: Vec<Campaign> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for article in articles.iter().filter(|a| a.is_fud) {
        let Some(first) = article.keywords.first() else {
            continue;
        };
        let slot = *index.entry(first.keyword.as_str()).or_insert_with(|| {
            campaigns.push(Campaign {
                keyword: first.keyword.clone(),
                members: Vec::new(),
            });
            campaigns.len() - 1
        });
        campaigns[slot].members.push(article.clone());
    }

    campaigns.retain(|c| c.members.len() >= min_size);
    campaigns
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicCount {
    pub keyword: String,
    pub count: usize,
}

/// Every keyword across all articles, most frequent first. Ties keep
/// first-seen order.
pub fn trending_topics(articles: &[FudScore]) -> Vec<TopicCount> {
    let mut topics: Vec<TopicCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for article in articles {
        for m in &article.keywords {
            match index.get(m.keyword.as_str()) {
                Some(&i) => topics[i].count += 1,
                None => {
                    index.insert(m.keyword.as_str(), topics.len());
                    topics.push(TopicCount {
                        keyword: m.keyword.clone(),
                        count: 1,
                    });
                }
            }
        }
    }

    topics.sort_by(|a, b| b.count.cmp(&a.count));
    topics
}
