//! Feed definitions: one configured page to mirror into a feed document.

use super::template::PostTemplate;
use crate::error::SitefeedError;
use crate::schedule::{Schedule, parse_active_days, parse_interval};
use crate::status::ErrorLog;
use crate::utils::{bold_list, italic, json_block};
use serde::Deserialize;
use serde_json::Value;

const REQUIRED_KEYS: [&str; 5] = ["url", "file", "description", "title", "post"];

/// One configured target. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDefinition {
    /// Page the posts are scraped from; also the permalink fallback.
    pub url: String,
    pub title: String,
    /// Channel description used when the document is first created.
    pub description: String,
    /// Document name, without the `.xml` extension.
    pub file: String,
    /// Maximum number of retained posts.
    pub keep: usize,
    /// A title match only counts as a duplicate when the link matches too.
    pub verify_uniqueness: bool,
    pub include_guid: bool,
    pub schedule: Schedule,
    pub template: PostTemplate,
}

#[derive(Debug, Deserialize)]
struct RawFeed {
    url: Option<String>,
    file: Option<String>,
    title: Option<String>,
    description: Option<String>,
    post: Option<Value>,
    keep_posts: Option<usize>,
    verify_uniqueness: Option<bool>,
    guid: Option<bool>,
    time_between_queries: Option<Value>,
    days_of_week: Option<Value>,
}

impl FeedDefinition {
    /// Parse one entry of the `feeds` list.
    ///
    /// Every problem is reported to `log`; `None` means this feed is skipped
    /// for the run while the rest of the configuration stays usable.
    pub fn parse(value: &Value, default_keep: usize, log: &mut ErrorLog) -> Option<Self> {
        if !value.is_object() {
            log.record(format!(
                "Error parsing feed definition {}must be a json object",
                json_block(value)
            ));
            return None;
        }

        let raw: RawFeed = match serde_json::from_value(value.clone()) {
            Ok(raw) => raw,
            Err(e) => {
                log.record_failure(
                    Some(&format!("Error decoding feed definition {}", json_block(value))),
                    &SitefeedError::from(e),
                );
                return None;
            }
        };

        let missing = missing_keys(&raw);
        let RawFeed {
            url: Some(url),
            file: Some(file),
            title: Some(title),
            description: Some(description),
            post: Some(post),
            keep_posts,
            verify_uniqueness,
            guid,
            time_between_queries,
            days_of_week,
        } = raw
        else {
            log.record_with(
                format!(
                    "Feed definition requires {} properties, definition looks like {}and is missing",
                    bold_list(&REQUIRED_KEYS),
                    json_block(value)
                ),
                bold_list(&missing),
            );
            return None;
        };

        let template = PostTemplate::parse(&post, &title, log)?;
        let interval = time_between_queries
            .as_ref()
            .and_then(|v| parse_interval(v, &title, log));
        let schedule = match days_of_week.as_ref() {
            Some(days) => Schedule {
                interval,
                active_days: parse_active_days(days, &title, log),
            },
            None => Schedule {
                interval,
                ..Schedule::default()
            },
        };

        Some(Self {
            url,
            title,
            description,
            file,
            keep: keep_posts.unwrap_or(default_keep),
            verify_uniqueness: verify_uniqueness.unwrap_or(false),
            include_guid: guid.unwrap_or(true),
            schedule,
            template,
        })
    }
}

fn missing_keys(raw: &RawFeed) -> Vec<&'static str> {
    let present = [
        raw.url.is_some(),
        raw.file.is_some(),
        raw.description.is_some(),
        raw.title.is_some(),
        raw.post.is_some(),
    ];
    REQUIRED_KEYS
        .into_iter()
        .zip(present)
        .filter_map(|(key, has)| (!has).then_some(key))
        .collect()
}
