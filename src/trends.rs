use std::collections::HashMap;

use crate::api::Tweet;

/// A trending topic for the side panel: hashtag plus how many of the
/// sampled tweets mention it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trend {
    pub topic: String,
    pub tweet_count: usize,
}

/// Rank hashtags across a sample of recent tweets. A tag counts once per
/// tweet no matter how often it repeats inside the text. Ties break
/// alphabetically so the panel is stable between refreshes.
pub fn trending_topics(tweets: &[Tweet], max_topics: usize) -> Vec<Trend> {
    let mut counts: HashMap<String, (String, usize)> = HashMap::new();

    for tweet in tweets {
        let mut seen_in_tweet: Vec<String> = Vec::new();
        for tag in extract_hashtags(&tweet.content) {
            let key = tag.to_lowercase();
            if seen_in_tweet.contains(&key) {
                continue;
            }
            seen_in_tweet.push(key.clone());
            let entry = counts.entry(key).or_insert_with(|| (tag, 0));
            entry.1 += 1;
        }
    }

    let mut trends: Vec<Trend> = counts
        .into_values()
        .map(|(topic, tweet_count)| Trend { topic, tweet_count })
        .collect();

    trends.sort_by(|a, b| {
        b.tweet_count
            .cmp(&a.tweet_count)
            .then_with(|| a.topic.to_lowercase().cmp(&b.topic.to_lowercase()))
    });
    trends.truncate(max_topics);
    trends
}

/// Pull `#hashtag` tokens out of tweet text. A tag is `#` followed by at
/// least one alphanumeric or underscore character; trailing punctuation is
/// not part of the tag.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    let mut tags = Vec::new();

    for token in text.split_whitespace() {
        let Some(rest) = token.strip_prefix('#') else {
            continue;
        };
        let tag: String = rest
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if !tag.is_empty() {
            tags.push(format!("#{}", tag));
        }
    }

    tags
}
