//! Post templates: where on a page each field of a post lives.
//!
//! A template is parsed from a feed's `post` block. When the block carries a
//! `base_query`, every selector in it is prefixed with `"<base_query> "`.

use crate::error::SitefeedError;
use crate::status::ErrorLog;
use crate::utils::{bold, bold_list, italic, json_block};
use serde::Deserialize;
use serde_json::Value;

/// How a post's description is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptionSpec {
    /// The description repeats the post title.
    Absent,
    /// Text of the first match, falling back to the post title.
    Single(String),
    /// Outer markup of each selector's first match, concatenated.
    /// Selectors that find nothing are skipped.
    Composite(Vec<String>),
}

/// Field extraction rules for one feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostTemplate {
    pub title_query: String,
    /// `None` stamps posts with the current time.
    pub publish_date_query: Option<String>,
    pub permalink_query: String,
    pub description: DescriptionSpec,
    pub author_query: Option<String>,
    /// Join every author match with `" & "` instead of taking the first.
    pub multi_author: bool,
}

#[derive(Debug, Deserialize)]
struct RawPost {
    title: Option<String>,
    publish_date: Option<String>,
    permalink: Option<String>,
    description: Option<Value>,
    author: Option<String>,
    #[serde(default)]
    multi_author: bool,
    base_query: Option<String>,
}

fn with_base(base: Option<&str>, query: &str) -> String {
    match base {
        Some(base) => format!("{base} {query}"),
        None => query.to_string(),
    }
}

impl PostTemplate {
    /// Parse a `post` block for the feed titled `feed_title`.
    ///
    /// Returns `None` (after reporting why) when the block is not an object,
    /// fails to decode, or lacks `title` / `permalink`.
    pub fn parse(value: &Value, feed_title: &str, log: &mut ErrorLog) -> Option<Self> {
        if !value.is_object() {
            log.record(format!(
                "Error parsing {} post definition {}must be a json object",
                italic(feed_title),
                json_block(value)
            ));
            return None;
        }

        let raw: RawPost = match serde_json::from_value(value.clone()) {
            Ok(raw) => raw,
            Err(e) => {
                let prefix = format!("Error decoding {} post definition", italic(feed_title));
                log.record_failure(Some(&prefix), &SitefeedError::from(e));
                return None;
            }
        };

        let missing: Vec<&str> = [("title", raw.title.is_none()), ("permalink", raw.permalink.is_none())]
            .into_iter()
            .filter_map(|(key, absent)| absent.then_some(key))
            .collect();
        let (Some(title), Some(permalink)) = (raw.title.as_deref(), raw.permalink.as_deref()) else {
            log.record_with(
                format!(
                    "Post definition requires {} properties, {} post definition looks like {}and is missing",
                    bold_list(&["title", "permalink"]),
                    italic(feed_title),
                    json_block(value)
                ),
                bold_list(&missing),
            );
            return None;
        };

        let base = raw.base_query.as_deref();
        Some(Self {
            title_query: with_base(base, title),
            publish_date_query: raw.publish_date.as_deref().map(|q| with_base(base, q)),
            permalink_query: with_base(base, permalink),
            description: DescriptionSpec::parse(raw.description.as_ref(), base, feed_title, log),
            author_query: raw.author.as_deref().map(|q| with_base(base, q)),
            multi_author: raw.multi_author,
        })
    }
}

impl DescriptionSpec {
    /// Interpret a `description` value: absent, a selector, or a list of selectors.
    ///
    /// Anything else is reported and treated as absent.
    fn parse(value: Option<&Value>, base: Option<&str>, feed_title: &str, log: &mut ErrorLog) -> Self {
        match value {
            None | Some(Value::Null) => DescriptionSpec::Absent,
            Some(Value::String(query)) => DescriptionSpec::Single(with_base(base, query)),
            Some(Value::Array(entries)) => {
                let mut queries = Vec::with_capacity(entries.len());
                for entry in entries {
                    match entry.as_str() {
                        Some(query) => queries.push(with_base(base, query)),
                        None => log.record(format!(
                            "Description component for {} must be a string, was {}skipping it",
                            italic(feed_title),
                            json_block(entry)
                        )),
                    }
                }
                if queries.is_empty() {
                    DescriptionSpec::Absent
                } else {
                    DescriptionSpec::Composite(queries)
                }
            }
            Some(other) => {
                log.record(format!(
                    "Description definition for {} was an unexpected value, should be absent, a string, or an array of strings, was {}({})",
                    italic(feed_title),
                    json_block(other),
                    bold(json_kind(other))
                ));
                DescriptionSpec::Absent
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
